//! Post service
//!
//! Query composition for the blog pages:
//! - Popular posts, ranked by like count (cached)
//! - Fresh posts, the newest slice shown oldest first
//! - Posts of one tag, newest first
//! - A single post with its comments, likes and tags
//!
//! Every list goes through `hydrate`, which loads authors, tags (with their
//! post counts) and comment counts for the whole list with one query each.
//! The write path (posts, likes, comments) drops cached rankings.

use crate::cache::{Cache, CacheLayer, Generation};
use crate::db::repositories::{CommentRepository, PostRepository, TagRepository, UserRepository};
use crate::models::{Comment, CreateCommentInput, CreatePostInput, Post, PostCard, PostDetail};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::{anyhow, Context};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Cache key prefix for popular-post rankings
const CACHE_KEY_POPULAR_POSTS: &str = "posts:popular:";

/// Longest post title and slug the schema accepts
pub const MAX_TITLE_CHARS: usize = 200;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Duplicate slug
    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for PostServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(msg) => PostServiceError::NotFound(msg),
            TagServiceError::ValidationError(msg) => PostServiceError::ValidationError(msg),
            TagServiceError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

/// Repositories the post service reads from
#[derive(Clone)]
pub struct PostRepositories {
    pub posts: Arc<dyn PostRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

/// Post service
pub struct PostService {
    repos: PostRepositories,
    tag_service: Arc<TagService>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
    generation: Generation,
}

impl PostService {
    /// Create a new post service
    ///
    /// # Arguments
    /// * `repos` - Post, user, tag and comment repositories
    /// * `tag_service` - Used to create tags on the write path and to drop tag rankings
    /// * `cache` - Cache for popular-post rankings
    pub fn new(repos: PostRepositories, tag_service: Arc<TagService>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repos,
            tag_service,
            cache,
            cache_ttl,
            generation: Generation::default(),
        }
    }

    /// Posts ordered by like count (descending), hydrated.
    ///
    /// Ties go to the more recently published post. Cached under
    /// `posts:popular:{limit}`.
    pub async fn popular_posts(&self, limit: usize) -> Result<Vec<PostCard>, PostServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_POPULAR_POSTS, limit);
        if let Ok(Some(cached)) = self.cache.get::<Vec<PostCard>>(&cache_key).await {
            return Ok(cached);
        }

        let seen = self.generation.current();
        let ranked = self
            .repos
            .posts
            .popular(limit)
            .await
            .context("Failed to get popular posts")?;
        let posts = ranked.into_iter().map(|p| p.post).collect();
        let cards = self.hydrate(posts).await?;

        if let Err(e) = self
            .cache
            .fill(&cache_key, &cards, self.cache_ttl, &self.generation, seen)
            .await
        {
            tracing::warn!("Failed to cache popular posts: {}", e);
        }

        Ok(cards)
    }

    /// The `limit` most recent posts, oldest of them first
    pub async fn fresh_posts(&self, limit: usize) -> Result<Vec<PostCard>, PostServiceError> {
        let mut posts = self
            .repos
            .posts
            .latest(limit)
            .await
            .context("Failed to get latest posts")?;
        posts.reverse();
        self.hydrate(posts).await
    }

    /// Posts tagged with `title`, newest first, at most `limit`
    pub async fn posts_by_tag(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<PostCard>, PostServiceError> {
        let posts = self
            .repos
            .posts
            .list_by_tag_title(title, limit)
            .await
            .context("Failed to list posts by tag")?;
        self.hydrate(posts).await
    }

    /// A post with its author, comments (oldest first), likes and tags
    ///
    /// # Errors
    /// - `NotFound` if no post has this slug
    pub async fn post_detail(&self, slug: &str) -> Result<PostDetail, PostServiceError> {
        let post = self
            .repos
            .posts
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post '{}' not found", slug)))?;

        let author = self
            .repos
            .users
            .get_by_id(post.author_id)
            .await
            .context("Failed to get post author")?
            .ok_or_else(|| anyhow!("Author {} of post '{}' is missing", post.author_id, slug))?;
        let comments = self
            .repos
            .comments
            .list_by_post(post.id)
            .await
            .context("Failed to list comments")?;
        let likes_count = self
            .repos
            .posts
            .like_count(post.id)
            .await
            .context("Failed to count likes")?;
        let tags = self
            .repos
            .tags
            .for_posts(&[post.id])
            .await
            .context("Failed to load post tags")?
            .remove(&post.id)
            .unwrap_or_default();

        Ok(PostDetail {
            post,
            author,
            comments,
            likes_count,
            tags,
        })
    }

    /// Attach authors, tags and comment counts to a list of posts.
    ///
    /// Issues one query per relation regardless of the list length and keeps
    /// the input order.
    pub async fn hydrate(&self, posts: Vec<Post>) -> Result<Vec<PostCard>, PostServiceError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let author_ids: Vec<i64> = posts
            .iter()
            .map(|p| p.author_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let authors = self
            .repos
            .users
            .get_by_ids(&author_ids)
            .await
            .context("Failed to load post authors")?;
        let mut tags = self
            .repos
            .tags
            .for_posts(&post_ids)
            .await
            .context("Failed to load post tags")?;
        let comment_counts = self
            .repos
            .comments
            .counts_for_posts(&post_ids)
            .await
            .context("Failed to count comments")?;

        let mut cards = Vec::with_capacity(posts.len());
        for post in posts {
            let author = match authors.get(&post.author_id) {
                Some(author) => author.clone(),
                None => {
                    return Err(anyhow!(
                        "Author {} of post '{}' is missing",
                        post.author_id,
                        post.slug
                    )
                    .into())
                }
            };
            cards.push(PostCard {
                author,
                tags: tags.remove(&post.id).unwrap_or_default(),
                comments_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                post,
            });
        }

        Ok(cards)
    }

    /// Create a post, creating missing tags and linking them
    ///
    /// # Errors
    /// - `ValidationError` for an empty or oversized title, a malformed slug,
    ///   or an invalid tag title
    /// - `DuplicateSlug` if the slug is taken
    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(PostServiceError::ValidationError(format!(
                "Title cannot exceed {} characters",
                MAX_TITLE_CHARS
            )));
        }
        if !is_valid_slug(&input.slug) {
            return Err(PostServiceError::ValidationError(format!(
                "Invalid slug '{}': use letters, digits, '-' or '_'",
                input.slug
            )));
        }
        if self
            .repos
            .posts
            .get_by_slug(&input.slug)
            .await
            .context("Failed to check existing slug")?
            .is_some()
        {
            return Err(PostServiceError::DuplicateSlug(input.slug));
        }

        // Resolve tags before inserting so a bad title leaves no half-written post
        let mut tags = Vec::with_capacity(input.tags.len());
        for tag_title in &input.tags {
            tags.push(self.tag_service.create_or_get(tag_title).await?);
        }

        let post = Post {
            id: 0,
            title: title.to_string(),
            text: input.text,
            slug: input.slug,
            image: input.image.filter(|image| !image.trim().is_empty()),
            author_id: input.author_id,
            published_at: input.published_at.unwrap_or_else(Utc::now),
        };
        let created = self
            .repos
            .posts
            .create(&post)
            .await
            .context("Failed to create post")?;

        for tag in &tags {
            self.tag_service.add_to_post(tag.id, created.id).await?;
        }

        tracing::info!("Created post '{}' with {} tag(s)", created.slug, tags.len());
        self.invalidate_rankings().await;
        Ok(created)
    }

    /// Like a post. Returns false if the user had already liked it.
    pub async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool, PostServiceError> {
        let added = self
            .repos
            .posts
            .add_like(post_id, user_id)
            .await
            .context("Failed to add like")?;
        if added {
            self.invalidate_rankings().await;
        }
        Ok(added)
    }

    /// Comment on a post
    ///
    /// # Errors
    /// - `ValidationError` if the text is blank
    pub async fn add_comment(&self, input: CreateCommentInput) -> Result<Comment, PostServiceError> {
        if input.text.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Comment text cannot be empty".to_string(),
            ));
        }
        let comment = self
            .repos
            .comments
            .create(&input)
            .await
            .context("Failed to create comment")?;
        self.invalidate_rankings().await;
        Ok(comment)
    }

    /// Drop cached post and tag rankings
    pub async fn invalidate_rankings(&self) {
        self.generation.bump();
        if let Err(e) = self.cache.delete_pattern("posts:*").await {
            tracing::warn!("Failed to invalidate post cache: {}", e);
        }
        self.tag_service.invalidate_cache().await;
    }
}

/// Slugs are non-empty, at most 200 characters of ASCII letters, digits,
/// `-` and `_`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_TITLE_CHARS
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
