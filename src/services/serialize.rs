//! Plain records handed to templates
//!
//! Loaded rows are flattened into string/number records so templates never
//! reach back into the database. Field names are part of the template
//! contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MediaConfig, PagesConfig};
use crate::models::{CommentWithAuthor, PostCard, PostDetail, TagWithCount};

/// A tag with the number of posts carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedTag {
    pub title: String,
    pub posts_with_tag: i64,
}

/// A post as shown in lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPost {
    pub title: String,
    pub teaser_text: String,
    pub author: String,
    pub comments_amount: i64,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub slug: String,
    pub tags: Vec<SerializedTag>,
    /// `None` for an untagged post
    pub first_tag_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedComment {
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub author: String,
}

/// A post as shown on its own page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPostDetail {
    pub title: String,
    pub text: String,
    pub author: String,
    pub comments: Vec<SerializedComment>,
    pub likes_amount: i64,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub slug: String,
    pub tags: Vec<SerializedTag>,
}

/// Turns hydrated posts and tags into template records
#[derive(Debug, Clone)]
pub struct Serializer {
    media: MediaConfig,
    teaser_length: usize,
}

impl Serializer {
    pub fn new(media: MediaConfig, teaser_length: usize) -> Self {
        Self {
            media,
            teaser_length,
        }
    }

    pub fn from_config(media: &MediaConfig, pages: &PagesConfig) -> Self {
        Self::new(media.clone(), pages.teaser_length)
    }

    pub fn serialize_tag(&self, tag: &TagWithCount) -> SerializedTag {
        SerializedTag {
            title: tag.tag.title.clone(),
            posts_with_tag: tag.posts_count,
        }
    }

    pub fn serialize_tags(&self, tags: &[TagWithCount]) -> Vec<SerializedTag> {
        tags.iter().map(|t| self.serialize_tag(t)).collect()
    }

    pub fn serialize_post(&self, card: &PostCard) -> SerializedPost {
        SerializedPost {
            title: card.post.title.clone(),
            teaser_text: teaser(&card.post.text, self.teaser_length).to_string(),
            author: card.author.username.clone(),
            comments_amount: card.comments_count,
            image_url: self.image_url(card.post.image.as_deref()),
            published_at: card.post.published_at,
            slug: card.post.slug.clone(),
            tags: self.serialize_tags(&card.tags),
            first_tag_title: card.tags.first().map(|t| t.tag.title.clone()),
        }
    }

    pub fn serialize_posts(&self, cards: &[PostCard]) -> Vec<SerializedPost> {
        cards.iter().map(|c| self.serialize_post(c)).collect()
    }

    pub fn serialize_comment(&self, comment: &CommentWithAuthor) -> SerializedComment {
        SerializedComment {
            text: comment.comment.text.clone(),
            published_at: comment.comment.published_at,
            author: comment.author_username.clone(),
        }
    }

    pub fn serialize_post_detail(&self, detail: &PostDetail) -> SerializedPostDetail {
        SerializedPostDetail {
            title: detail.post.title.clone(),
            text: detail.post.text.clone(),
            author: detail.author.username.clone(),
            comments: detail
                .comments
                .iter()
                .map(|c| self.serialize_comment(c))
                .collect(),
            likes_amount: detail.likes_count,
            image_url: self.image_url(detail.post.image.as_deref()),
            published_at: detail.post.published_at,
            slug: detail.post.slug.clone(),
            tags: self.serialize_tags(&detail.tags),
        }
    }

    fn image_url(&self, image: Option<&str>) -> Option<String> {
        image
            .filter(|path| !path.trim().is_empty())
            .map(|path| self.media.image_url(path))
    }
}

/// The first `max_chars` characters of `text`, never splitting a code point
pub fn teaser(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
