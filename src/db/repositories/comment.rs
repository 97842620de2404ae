//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::in_placeholders;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments of a post, oldest first, each with its own author's username
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;

    /// Number of comments per post in one grouped query.
    /// Posts without comments are absent from the map.
    async fn counts_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>>;
}

/// Comment repository implementation
pub struct CommentRepositoryImpl {
    pool: DynDatabasePool,
}

impl CommentRepositoryImpl {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for CommentRepositoryImpl {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), input).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), input).await,
        }
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_by_post_sqlite(self.pool.as_sqlite().unwrap(), post_id).await,
            DatabaseDriver::Mysql => list_by_post_mysql(self.pool.as_mysql().unwrap(), post_id).await,
        }
    }

    async fn counts_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => counts_sqlite(self.pool.as_sqlite().unwrap(), post_ids).await,
            DatabaseDriver::Mysql => counts_mysql(self.pool.as_mysql().unwrap(), post_ids).await,
        }
    }
}

const LIST_BY_POST_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author_id, c.text, c.published_at, u.username AS author_username
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.published_at ASC, c.id ASC
"#;

fn counts_sql(count: usize) -> String {
    format!(
        "SELECT post_id, COUNT(*) AS comments_count FROM comments WHERE post_id IN ({}) GROUP BY post_id",
        in_placeholders(count)
    )
}

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let published_at = input.published_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, text, published_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.author_id)
    .bind(&input.text)
    .bind(published_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: input.post_id,
        author_id: input.author_id,
        text: input.text.clone(),
        published_at,
    })
}

async fn list_by_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(LIST_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                text: row.get("text"),
                published_at: row.get("published_at"),
            },
            author_username: row.get("author_username"),
        })
        .collect())
}

async fn counts_sqlite(pool: &SqlitePool, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
    let sql = counts_sql(post_ids.len());
    let mut query = sqlx::query(&sql);
    for id in post_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to count comments")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("post_id"), row.get("comments_count")))
        .collect())
}

// MySQL implementations (similar to SQLite)
async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let published_at = input.published_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, text, published_at) VALUES (?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.author_id)
    .bind(&input.text)
    .bind(published_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id: input.post_id,
        author_id: input.author_id,
        text: input.text.clone(),
        published_at,
    })
}

async fn list_by_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
    let rows = sqlx::query(LIST_BY_POST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|row| CommentWithAuthor {
            comment: Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                text: row.get("text"),
                published_at: row.get("published_at"),
            },
            author_username: row.get("author_username"),
        })
        .collect())
}

async fn counts_mysql(pool: &MySqlPool, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
    let sql = counts_sql(post_ids.len());
    let mut query = sqlx::query(&sql);
    for id in post_ids {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to count comments")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("post_id"), row.get("comments_count")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, TimeZone};

    async fn setup() -> (DynDatabasePool, CommentRepositoryImpl) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = CommentRepositoryImpl::new(pool.clone());
        (pool, repo)
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(username)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn insert_post(pool: &SqlitePool, author_id: i64, slug: &str) -> i64 {
        sqlx::query(
            "INSERT INTO posts (title, text, slug, author_id, published_at) VALUES ('T', 'X', ?, ?, '2024-01-01 00:00:00')",
        )
        .bind(slug)
        .bind(author_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn comment(post_id: i64, author_id: i64, text: &str, minutes: i64) -> CreateCommentInput {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        CreateCommentInput {
            post_id,
            author_id,
            text: text.to_string(),
            published_at: Some(base + Duration::minutes(minutes)),
        }
    }

    #[tokio::test]
    async fn test_create_comment() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let ann = insert_user(sqlite, "ann").await;
        let post = insert_post(sqlite, ann, "hello").await;

        let created = repo
            .create(&comment(post, ann, "Nice", 0))
            .await
            .expect("Failed to create comment");

        assert!(created.id > 0);
        assert_eq!(created.post_id, post);
        assert_eq!(created.text, "Nice");
    }

    #[tokio::test]
    async fn test_list_by_post_uses_each_comment_author() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let ann = insert_user(sqlite, "ann").await;
        let bob = insert_user(sqlite, "bob").await;
        let post = insert_post(sqlite, ann, "hello").await;

        repo.create(&comment(post, bob, "second", 10)).await.unwrap();
        repo.create(&comment(post, ann, "first", 5)).await.unwrap();

        let comments = repo.list_by_post(post).await.expect("Failed to list comments");

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment.text, "first");
        assert_eq!(comments[0].author_username, "ann");
        assert_eq!(comments[1].comment.text, "second");
        assert_eq!(comments[1].author_username, "bob");
    }

    #[tokio::test]
    async fn test_counts_for_posts() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let ann = insert_user(sqlite, "ann").await;
        let p1 = insert_post(sqlite, ann, "one").await;
        let p2 = insert_post(sqlite, ann, "two").await;
        let p3 = insert_post(sqlite, ann, "three").await;

        for i in 0..3 {
            repo.create(&comment(p1, ann, "x", i)).await.unwrap();
        }
        repo.create(&comment(p2, ann, "y", 0)).await.unwrap();
        repo.create(&comment(p3, ann, "z", 0)).await.unwrap();

        let counts = repo.counts_for_posts(&[p1, p2]).await.expect("Failed to count");

        assert_eq!(counts.get(&p1), Some(&3));
        assert_eq!(counts.get(&p2), Some(&1));
        assert_eq!(counts.get(&p3), None);
    }

    #[tokio::test]
    async fn test_comments_removed_with_post() {
        let (pool, repo) = setup().await;
        let sqlite = pool.as_sqlite().unwrap();
        let ann = insert_user(sqlite, "ann").await;
        let post = insert_post(sqlite, ann, "gone").await;
        repo.create(&comment(post, ann, "x", 0)).await.unwrap();

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post)
            .execute(sqlite)
            .await
            .unwrap();

        assert!(repo.list_by_post(post).await.unwrap().is_empty());
    }
}
