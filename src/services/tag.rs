//! Tag service
//!
//! Implements business logic for tags:
//! - Popular tags, ranked by how many posts carry them (cached)
//! - Exact-title lookup for the tag filter page
//! - Create or reuse tags when posts are written

use crate::cache::{Cache, CacheLayer, Generation};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Cache key prefix for popular-tag rankings
const CACHE_KEY_POPULAR_TAGS: &str = "tags:popular:";

/// Longest tag title the schema accepts
pub const MAX_TAG_TITLE_CHARS: usize = 20;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
    generation: Generation,
}

impl TagService {
    /// Create a new tag service; rankings are cached for the cache's default TTL
    pub fn new(repo: Arc<dyn TagRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
            generation: Generation::default(),
        }
    }

    /// Tags ordered by number of posts (descending), ties by title.
    ///
    /// Each entry carries its post count. Results are cached under
    /// `tags:popular:{limit}` until a write invalidates them.
    pub async fn popular_tags(&self, limit: usize) -> Result<Vec<TagWithCount>, TagServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_POPULAR_TAGS, limit);
        if let Ok(Some(cached)) = self.cache.get::<Vec<TagWithCount>>(&cache_key).await {
            return Ok(cached);
        }

        let seen = self.generation.current();
        let tags = self
            .repo
            .popular(limit)
            .await
            .context("Failed to get popular tags")?;

        if let Err(e) = self
            .cache
            .fill(&cache_key, &tags, self.cache_ttl, &self.generation, seen)
            .await
        {
            tracing::warn!("Failed to cache popular tags: {}", e);
        }

        Ok(tags)
    }

    /// Exact-title lookup, `None` when no tag has this title
    pub async fn get_by_title(&self, title: &str) -> Result<Option<Tag>, TagServiceError> {
        self.repo
            .get_by_title(title)
            .await
            .context("Failed to get tag by title")
            .map_err(Into::into)
    }

    /// Create a new tag or get the existing one with the same title
    ///
    /// # Errors
    /// - `ValidationError` if the trimmed title is empty or too long
    pub async fn create_or_get(&self, title: &str) -> Result<Tag, TagServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TAG_TITLE_CHARS {
            return Err(TagServiceError::ValidationError(format!(
                "Tag title cannot exceed {} characters",
                MAX_TAG_TITLE_CHARS
            )));
        }

        if let Some(existing) = self
            .repo
            .get_by_title(title)
            .await
            .context("Failed to check existing tag")?
        {
            return Ok(existing);
        }

        let created = self
            .repo
            .create(&Tag::new(title.to_string()))
            .await
            .context("Failed to create tag")?;

        tracing::debug!("Created tag '{}' (id {})", created.title, created.id);
        Ok(created)
    }

    /// Link a tag to a post; no-op when already linked
    pub async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<(), TagServiceError> {
        self.repo
            .add_to_post(tag_id, post_id)
            .await
            .context("Failed to add tag to post")
            .map_err(Into::into)
    }

    /// Drop every cached tag ranking
    pub async fn invalidate_cache(&self) {
        self.generation.bump();
        if let Err(e) = self.cache.delete_pattern("tags:*").await {
            tracing::warn!("Failed to invalidate tag cache: {}", e);
        }
    }
}
