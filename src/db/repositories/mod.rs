//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod comment;
pub mod post;
pub mod tag;
pub mod user;

pub use comment::{CommentRepository, CommentRepositoryImpl};
pub use post::{PostRepository, SqlxPostRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` clause with `count` bound values
pub(crate) fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `LIMIT` bind value; limits past `i64::MAX` mean no limit
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
