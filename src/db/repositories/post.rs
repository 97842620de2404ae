//! Post repository
//!
//! Database operations for posts and their likes.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! List queries return bare posts (or posts with like counts); authors, tags
//! and comment counts are batch-loaded by the caller through the other
//! repositories.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Post, PostWithStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::sql_limit;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Get post by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Posts with their like counts, most liked first.
    /// Ties go to the more recently published post, then the higher ID.
    async fn popular(&self, limit: usize) -> Result<Vec<PostWithStats>>;

    /// Most recently published posts, newest first
    async fn latest(&self, limit: usize) -> Result<Vec<Post>>;

    /// Posts carrying the tag with this exact title, newest first
    async fn list_by_tag_title(&self, title: &str, limit: usize) -> Result<Vec<Post>>;

    /// Number of likes a post received
    async fn like_count(&self, post_id: i64) -> Result<i64>;

    /// Record a like. Returns false if the user already liked the post.
    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.as_sqlite().unwrap(), post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.as_mysql().unwrap(), post).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_post_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await
            }
            DatabaseDriver::Mysql => {
                get_post_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await
            }
        }
    }

    async fn popular(&self, limit: usize) -> Result<Vec<PostWithStats>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                popular_posts_sqlite(self.pool.as_sqlite().unwrap(), limit).await
            }
            DatabaseDriver::Mysql => popular_posts_mysql(self.pool.as_mysql().unwrap(), limit).await,
        }
    }

    async fn latest(&self, limit: usize) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => latest_posts_sqlite(self.pool.as_sqlite().unwrap(), limit).await,
            DatabaseDriver::Mysql => latest_posts_mysql(self.pool.as_mysql().unwrap(), limit).await,
        }
    }

    async fn list_by_tag_title(&self, title: &str, limit: usize) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_posts_by_tag_sqlite(self.pool.as_sqlite().unwrap(), title, limit).await
            }
            DatabaseDriver::Mysql => {
                list_posts_by_tag_mysql(self.pool.as_mysql().unwrap(), title, limit).await
            }
        }
    }

    async fn like_count(&self, post_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => like_count_sqlite(self.pool.as_sqlite().unwrap(), post_id).await,
            DatabaseDriver::Mysql => like_count_mysql(self.pool.as_mysql().unwrap(), post_id).await,
        }
    }

    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_like_sqlite(self.pool.as_sqlite().unwrap(), post_id, user_id).await
            }
            DatabaseDriver::Mysql => {
                add_like_mysql(self.pool.as_mysql().unwrap(), post_id, user_id).await
            }
        }
    }
}

const POST_COLUMNS: &str = "p.id, p.title, p.text, p.slug, p.image, p.author_id, p.published_at";

fn popular_posts_sql() -> String {
    format!(
        r#"
        SELECT {cols}, COUNT(l.user_id) AS likes_count
        FROM posts p
        LEFT JOIN post_likes l ON l.post_id = p.id
        GROUP BY {cols}
        ORDER BY likes_count DESC, p.published_at DESC, p.id DESC
        LIMIT ?
        "#,
        cols = POST_COLUMNS
    )
}

fn latest_posts_sql() -> String {
    format!(
        "SELECT {} FROM posts p ORDER BY p.published_at DESC, p.id DESC LIMIT ?",
        POST_COLUMNS
    )
}

fn posts_by_tag_sql() -> String {
    format!(
        r#"
        SELECT {}
        FROM posts p
        INNER JOIN post_tags pt ON pt.post_id = p.id
        INNER JOIN tags t ON t.id = pt.tag_id
        WHERE t.title = ?
        ORDER BY p.published_at DESC, p.id DESC
        LIMIT ?
        "#,
        POST_COLUMNS
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, slug, image, author_id, published_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(&post.slug)
    .bind(&post.image)
    .bind(post.author_id)
    .bind(post.published_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn get_post_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts p WHERE p.slug = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    match row {
        Some(row) => Ok(Some(row_to_post_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn popular_posts_sqlite(pool: &SqlitePool, limit: usize) -> Result<Vec<PostWithStats>> {
    let sql = popular_posts_sql();
    let rows = sqlx::query(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get popular posts")?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let post = row_to_post_sqlite(&row)?;
        posts.push(PostWithStats::new(post, row.get("likes_count")));
    }
    Ok(posts)
}

async fn latest_posts_sqlite(pool: &SqlitePool, limit: usize) -> Result<Vec<Post>> {
    let sql = latest_posts_sql();
    let rows = sqlx::query(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get latest posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn list_posts_by_tag_sqlite(pool: &SqlitePool, title: &str, limit: usize) -> Result<Vec<Post>> {
    let sql = posts_by_tag_sql();
    let rows = sqlx::query(&sql)
        .bind(title)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to list posts by tag")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn like_count_sqlite(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM post_likes WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count likes")?;

    Ok(row.get("count"))
}

async fn add_like_sqlite(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add like")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        slug: row.get("slug"),
        image: row.get("image"),
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, slug, image, author_id, published_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(&post.slug)
    .bind(&post.image)
    .bind(post.author_id)
    .bind(post.published_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

async fn get_post_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts p WHERE p.slug = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    match row {
        Some(row) => Ok(Some(row_to_post_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn popular_posts_mysql(pool: &MySqlPool, limit: usize) -> Result<Vec<PostWithStats>> {
    let sql = popular_posts_sql();
    let rows = sqlx::query(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get popular posts")?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let post = row_to_post_mysql(&row)?;
        posts.push(PostWithStats::new(post, row.get("likes_count")));
    }
    Ok(posts)
}

async fn latest_posts_mysql(pool: &MySqlPool, limit: usize) -> Result<Vec<Post>> {
    let sql = latest_posts_sql();
    let rows = sqlx::query(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get latest posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn list_posts_by_tag_mysql(pool: &MySqlPool, title: &str, limit: usize) -> Result<Vec<Post>> {
    let sql = posts_by_tag_sql();
    let rows = sqlx::query(&sql)
        .bind(title)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to list posts by tag")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn like_count_mysql(pool: &MySqlPool, post_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM post_likes WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count likes")?;

    Ok(row.get("count"))
}

async fn add_like_mysql(pool: &MySqlPool, post_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(post_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add like")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        slug: row.get("slug"),
        image: row.get("image"),
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
    })
}
