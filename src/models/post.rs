//! Post model
//!
//! This module provides:
//! - `Post` entity representing a published blog post
//! - `PostWithStats`, a post annotated with its like count (popularity rows)
//! - `PostCard`, a post with its prefetched author, tags and comment count
//! - `PostDetail`, a post with comments, likes and tags for its own page
//! - `CreatePostInput` for the write path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommentWithAuthor, TagWithCount, User};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// Full post text
    pub text: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Image path relative to the media directory
    #[serde(default)]
    pub image: Option<String>,
    /// Author user ID
    pub author_id: i64,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
}

/// Post annotated with the number of likes it received
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostWithStats {
    #[serde(flatten)]
    pub post: Post,
    pub likes_count: i64,
}

impl PostWithStats {
    pub fn new(post: Post, likes_count: i64) -> Self {
        Self { post, likes_count }
    }
}

/// A post with everything a list entry needs.
///
/// Built by batch-loading authors, tags (with their own post counts) and
/// comment counts for a whole page of posts at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostCard {
    pub post: Post,
    pub author: User,
    /// Tags ordered by title
    pub tags: Vec<TagWithCount>,
    pub comments_count: i64,
}

/// Everything the post page shows about one post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostDetail {
    pub post: Post,
    pub author: User,
    /// Oldest first
    pub comments: Vec<CommentWithAuthor>,
    pub likes_count: i64,
    /// Tags ordered by title
    pub tags: Vec<TagWithCount>,
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
    pub author_id: i64,
    /// Defaults to now
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Tag titles; missing tags are created
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostInput {
    /// Minimal input with no image, no tags, published now
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        slug: impl Into<String>,
        author_id: i64,
    ) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            slug: slug.into(),
            image: None,
            author_id,
            published_at: None,
            tags: Vec::new(),
        }
    }
}
