//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! Every tag-with-count returned here carries the total number of posts with
//! that tag, not only the posts in the current result.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::{in_placeholders, sql_limit};

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag
    async fn create(&self, tag: &Tag) -> Result<Tag>;

    /// Get tag by exact title
    async fn get_by_title(&self, title: &str) -> Result<Option<Tag>>;

    /// Tags sorted by number of posts (descending), ties by title
    async fn popular(&self, limit: usize) -> Result<Vec<TagWithCount>>;

    /// Tags of many posts in one query, keyed by post ID, each list ordered by title.
    async fn for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<TagWithCount>>>;

    /// Associate tag with post (no-op if already linked)
    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.as_sqlite().unwrap(), tag).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.as_mysql().unwrap(), tag).await,
        }
    }

    async fn get_by_title(&self, title: &str) -> Result<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tag_by_title_sqlite(self.pool.as_sqlite().unwrap(), title).await
            }
            DatabaseDriver::Mysql => {
                get_tag_by_title_mysql(self.pool.as_mysql().unwrap(), title).await
            }
        }
    }

    async fn popular(&self, limit: usize) -> Result<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                popular_tags_sqlite(self.pool.as_sqlite().unwrap(), limit).await
            }
            DatabaseDriver::Mysql => popular_tags_mysql(self.pool.as_mysql().unwrap(), limit).await,
        }
    }

    async fn for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<TagWithCount>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                tags_for_posts_sqlite(self.pool.as_sqlite().unwrap(), post_ids).await
            }
            DatabaseDriver::Mysql => {
                tags_for_posts_mysql(self.pool.as_mysql().unwrap(), post_ids).await
            }
        }
    }

    async fn add_to_post(&self, tag_id: i64, post_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_tag_to_post_sqlite(self.pool.as_sqlite().unwrap(), tag_id, post_id).await
            }
            DatabaseDriver::Mysql => {
                add_tag_to_post_mysql(self.pool.as_mysql().unwrap(), tag_id, post_id).await
            }
        }
    }
}

const POPULAR_TAGS_SQL: &str = r#"
    SELECT t.id, t.title, COUNT(pt.post_id) AS posts_count
    FROM tags t
    LEFT JOIN post_tags pt ON t.id = pt.tag_id
    GROUP BY t.id, t.title
    ORDER BY posts_count DESC, t.title ASC
    LIMIT ?
"#;

fn tags_for_posts_sql(count: usize) -> String {
    format!(
        r#"
        SELECT pt.post_id, t.id, t.title,
               (SELECT COUNT(*) FROM post_tags c WHERE c.tag_id = t.id) AS posts_count
        FROM post_tags pt
        INNER JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id IN ({})
        ORDER BY pt.post_id, t.title
        "#,
        in_placeholders(count)
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (title) VALUES (?)")
        .bind(&tag.title)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        title: tag.title.clone(),
    })
}

async fn get_tag_by_title_sqlite(pool: &SqlitePool, title: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, title FROM tags WHERE title = ?")
        .bind(title)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by title")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn popular_tags_sqlite(pool: &SqlitePool, limit: usize) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(POPULAR_TAGS_SQL)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get popular tags")?;

    let mut tags = Vec::with_capacity(rows.len());
    for row in rows {
        let tag = row_to_tag_sqlite(&row)?;
        tags.push(TagWithCount::new(tag, row.get("posts_count")));
    }
    Ok(tags)
}

async fn tags_for_posts_sqlite(
    pool: &SqlitePool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<TagWithCount>>> {
    let sql = tags_for_posts_sql(post_ids.len());
    let mut query = sqlx::query(&sql);
    for id in post_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tags for posts")?;

    let mut by_post: HashMap<i64, Vec<TagWithCount>> = HashMap::new();
    for row in rows {
        let post_id: i64 = row.get("post_id");
        let tag = row_to_tag_sqlite(&row)?;
        by_post
            .entry(post_id)
            .or_default()
            .push(TagWithCount::new(tag, row.get("posts_count")));
    }
    Ok(by_post)
}

async fn add_tag_to_post_sqlite(pool: &SqlitePool, tag_id: i64, post_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to add tag to post")?;

    Ok(())
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        title: row.get("title"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, tag: &Tag) -> Result<Tag> {
    let result = sqlx::query("INSERT INTO tags (title) VALUES (?)")
        .bind(&tag.title)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        title: tag.title.clone(),
    })
}

async fn get_tag_by_title_mysql(pool: &MySqlPool, title: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, title FROM tags WHERE title = ?")
        .bind(title)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by title")?;

    match row {
        Some(row) => Ok(Some(row_to_tag_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn popular_tags_mysql(pool: &MySqlPool, limit: usize) -> Result<Vec<TagWithCount>> {
    let rows = sqlx::query(POPULAR_TAGS_SQL)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .context("Failed to get popular tags")?;

    let mut tags = Vec::with_capacity(rows.len());
    for row in rows {
        let tag = row_to_tag_mysql(&row)?;
        tags.push(TagWithCount::new(tag, row.get("posts_count")));
    }
    Ok(tags)
}

async fn tags_for_posts_mysql(
    pool: &MySqlPool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<TagWithCount>>> {
    let sql = tags_for_posts_sql(post_ids.len());
    let mut query = sqlx::query(&sql);
    for id in post_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get tags for posts")?;

    let mut by_post: HashMap<i64, Vec<TagWithCount>> = HashMap::new();
    for row in rows {
        let post_id: i64 = row.get("post_id");
        let tag = row_to_tag_mysql(&row)?;
        by_post
            .entry(post_id)
            .or_default()
            .push(TagWithCount::new(tag, row.get("posts_count")));
    }
    Ok(by_post)
}

async fn add_tag_to_post_mysql(pool: &MySqlPool, tag_id: i64, post_id: i64) -> Result<()> {
    sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(tag_id)
        .execute(pool)
        .await
        .context("Failed to add tag to post")?;

    Ok(())
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Tag> {
    Ok(Tag {
        id: row.get("id"),
        title: row.get("title"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    /// Helper to create a user for post tests
    async fn create_test_user(pool: &SqlitePool) -> i64 {
        sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind("testuser")
            .execute(pool)
            .await
            .expect("Failed to create test user")
            .last_insert_rowid()
    }

    /// Helper to create a post for tag association tests
    async fn create_test_post(pool: &SqlitePool, author_id: i64, slug: &str) -> i64 {
        sqlx::query(
            r#"INSERT INTO posts (title, text, slug, author_id, published_at)
               VALUES (?, 'Text', ?, ?, '2024-01-01 00:00:00')"#,
        )
        .bind(format!("Title for {}", slug))
        .bind(slug)
        .bind(author_id)
        .execute(pool)
        .await
        .expect("Failed to create test post")
        .last_insert_rowid()
    }

    async fn create_tag(repo: &SqlxTagRepository, title: &str) -> Tag {
        repo.create(&Tag::new(title.to_string()))
            .await
            .expect("Failed to create tag")
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = create_tag(&repo, "rust").await;

        assert!(created.id > 0);
        assert_eq!(created.title, "rust");
    }

    #[tokio::test]
    async fn test_duplicate_title_fails() {
        let (_pool, repo) = setup_test_repo().await;

        create_tag(&repo, "rust").await;
        assert!(repo.create(&Tag::new("rust".to_string())).await.is_err());
    }

    #[tokio::test]
    async fn test_get_tag_by_title() {
        let (_pool, repo) = setup_test_repo().await;
        let created = create_tag(&repo, "python").await;

        let found = repo
            .get_by_title("python")
            .await
            .expect("Failed to get tag")
            .expect("Tag not found");
        assert_eq!(found, created);

        let missing = repo.get_by_title("Python").await.expect("Failed to get tag");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_add_tag_to_post_idempotent() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = create_test_user(sqlite_pool).await;
        let post_id = create_test_post(sqlite_pool, user_id, "test-post").await;
        let tag = create_tag(&repo, "test").await;

        repo.add_to_post(tag.id, post_id).await.expect("Failed to add tag");
        repo.add_to_post(tag.id, post_id).await.expect("Failed to add tag again");

        let row = sqlx::query("SELECT COUNT(*) as count FROM post_tags WHERE post_id = ? AND tag_id = ?")
            .bind(post_id)
            .bind(tag.id)
            .fetch_one(sqlite_pool)
            .await
            .expect("Failed to query post_tags");
        let count: i64 = row.get("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_popular_empty() {
        let (_pool, repo) = setup_test_repo().await;
        let tags = repo.popular(5).await.expect("Failed to get popular tags");
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_popular_sorted_by_posts_count() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = create_test_user(sqlite_pool).await;
        let p1 = create_test_post(sqlite_pool, user_id, "post-1").await;
        let p2 = create_test_post(sqlite_pool, user_id, "post-2").await;
        let p3 = create_test_post(sqlite_pool, user_id, "post-3").await;

        let rare = create_tag(&repo, "rare").await;
        let popular = create_tag(&repo, "popular").await;
        let medium = create_tag(&repo, "medium").await;
        create_tag(&repo, "unused").await;

        for post in [p1, p2, p3] {
            repo.add_to_post(popular.id, post).await.unwrap();
        }
        repo.add_to_post(medium.id, p1).await.unwrap();
        repo.add_to_post(medium.id, p2).await.unwrap();
        repo.add_to_post(rare.id, p1).await.unwrap();

        let tags = repo.popular(10).await.expect("Failed to get popular tags");
        let titles: Vec<_> = tags.iter().map(|t| t.tag.title.as_str()).collect();
        let counts: Vec<_> = tags.iter().map(|t| t.posts_count).collect();

        assert_eq!(titles, vec!["popular", "medium", "rare", "unused"]);
        assert_eq!(counts, vec![3, 2, 1, 0]);

        let top = repo.popular(2).await.expect("Failed to get popular tags");
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_ties_broken_by_title() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = create_test_user(sqlite_pool).await;
        let post = create_test_post(sqlite_pool, user_id, "post").await;
        for title in ["zeta", "alpha", "mid"] {
            let tag = create_tag(&repo, title).await;
            repo.add_to_post(tag.id, post).await.unwrap();
        }

        let tags = repo.popular(10).await.unwrap();
        let titles: Vec<_> = tags.iter().map(|t| t.tag.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn test_for_posts_carries_global_counts() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = create_test_user(sqlite_pool).await;
        let p1 = create_test_post(sqlite_pool, user_id, "post-1").await;
        let p2 = create_test_post(sqlite_pool, user_id, "post-2").await;
        let p3 = create_test_post(sqlite_pool, user_id, "post-3").await;

        let rust = create_tag(&repo, "rust").await;
        let db = create_tag(&repo, "db").await;
        repo.add_to_post(rust.id, p1).await.unwrap();
        repo.add_to_post(rust.id, p2).await.unwrap();
        repo.add_to_post(rust.id, p3).await.unwrap();
        repo.add_to_post(db.id, p1).await.unwrap();

        // p3 is tagged but not requested; its link still counts towards "rust"
        let by_post = repo.for_posts(&[p1, p2]).await.expect("Failed to load tags");

        let p1_tags = &by_post[&p1];
        assert_eq!(p1_tags.len(), 2);
        assert_eq!(p1_tags[0].tag.title, "db");
        assert_eq!(p1_tags[0].posts_count, 1);
        assert_eq!(p1_tags[1].tag.title, "rust");
        assert_eq!(p1_tags[1].posts_count, 3);

        assert_eq!(by_post[&p2].len(), 1);
        assert!(!by_post.contains_key(&p3));
    }

    #[tokio::test]
    async fn test_for_posts_empty_input() {
        let (_pool, repo) = setup_test_repo().await;
        let by_post = repo.for_posts(&[]).await.expect("Failed to load tags");
        assert!(by_post.is_empty());
    }
}
