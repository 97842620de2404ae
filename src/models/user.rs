//! User model
//!
//! Users author posts and comments and like posts. Accounts are managed
//! elsewhere; the blog front only needs the public username.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique), shown as the author of posts and comments
    pub username: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(username: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            username,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new("ann".to_string());
        assert_eq!(user.id, 0);
        assert_eq!(user.username, "ann");
    }
}
