//! Tag model
//!
//! Tags are free-form titles attached to posts (many-to-many). The number of
//! posts carrying a tag is its popularity.

use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Tag title (unique), also used in `/tags/{title}/` URLs
    pub title: String,
}

impl Tag {
    /// Create a new Tag.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(title: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            title,
        }
    }
}

/// Tag with the number of posts carrying it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagWithCount {
    /// The tag itself
    #[serde(flatten)]
    pub tag: Tag,
    /// Number of posts with this tag
    pub posts_count: i64,
}

impl TagWithCount {
    /// Create a new TagWithCount
    pub fn new(tag: Tag, posts_count: i64) -> Self {
        Self { tag, posts_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = Tag::new("rust".to_string());

        assert_eq!(tag.id, 0);
        assert_eq!(tag.title, "rust");
    }

    #[test]
    fn test_tag_with_count_serializes_flat() {
        let twc = TagWithCount::new(
            Tag {
                id: 3,
                title: "rust".to_string(),
            },
            42,
        );

        let json = serde_json::to_value(&twc).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["title"], "rust");
        assert_eq!(json["posts_count"], 42);
    }
}
