//! Page assembly
//!
//! Each public page is a typed context struct bound to a template name.
//! `PageService` runs the queries a page needs, serializes the rows and hands
//! the context back; rendering happens in the web layer.

use serde::Serialize;
use std::sync::Arc;

use crate::config::PagesConfig;
use crate::services::post::{PostService, PostServiceError};
use crate::services::serialize::{SerializedPost, SerializedPostDetail, SerializedTag, Serializer};
use crate::services::tag::{TagService, TagServiceError};

/// A serializable page context and the template that renders it
pub trait PageTemplate: Serialize {
    const TEMPLATE: &'static str;
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexPage {
    pub most_popular_posts: Vec<SerializedPost>,
    /// Newest posts, oldest of them first
    pub page_posts: Vec<SerializedPost>,
    pub popular_tags: Vec<SerializedTag>,
}

impl PageTemplate for IndexPage {
    const TEMPLATE: &'static str = "index.html";
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetailPage {
    pub post: SerializedPostDetail,
    pub popular_tags: Vec<SerializedTag>,
    pub most_popular_posts: Vec<SerializedPost>,
}

impl PageTemplate for PostDetailPage {
    const TEMPLATE: &'static str = "post-details.html";
}

#[derive(Debug, Clone, Serialize)]
pub struct TagFilterPage {
    /// The tag title as requested
    pub tag: String,
    pub posts: Vec<SerializedPost>,
    pub popular_tags: Vec<SerializedTag>,
    pub most_popular_posts: Vec<SerializedPost>,
}

impl PageTemplate for TagFilterPage {
    const TEMPLATE: &'static str = "posts-list.html";
}

/// Static contacts page. Reserved for visit statistics and a feedback form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactsPage {}

impl PageTemplate for ContactsPage {
    const TEMPLATE: &'static str = "contacts.html";
}

/// Error types for page assembly
#[derive(Debug, thiserror::Error)]
pub enum PageServiceError {
    /// The requested post or tag doesn't exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PostServiceError> for PageServiceError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(msg) => PageServiceError::NotFound(msg),
            PostServiceError::InternalError(e) => PageServiceError::InternalError(e),
            // Reads never validate; anything else here is a bug upstream
            other => PageServiceError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<TagServiceError> for PageServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(msg) => PageServiceError::NotFound(msg),
            TagServiceError::InternalError(e) => PageServiceError::InternalError(e),
            other => PageServiceError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Builds the context of every public page
pub struct PageService {
    posts: Arc<PostService>,
    tags: Arc<TagService>,
    serializer: Serializer,
    limits: PagesConfig,
}

impl PageService {
    pub fn new(
        posts: Arc<PostService>,
        tags: Arc<TagService>,
        serializer: Serializer,
        limits: PagesConfig,
    ) -> Self {
        Self {
            posts,
            tags,
            serializer,
            limits,
        }
    }

    /// Most liked posts, the freshest posts and the most used tags
    pub async fn index(&self) -> Result<IndexPage, PageServiceError> {
        let (popular, fresh) = tokio::try_join!(
            self.posts.popular_posts(self.limits.popular_posts),
            self.posts.fresh_posts(self.limits.fresh_posts),
        )?;
        let tags = self.tags.popular_tags(self.limits.popular_tags).await?;

        Ok(IndexPage {
            most_popular_posts: self.serializer.serialize_posts(&popular),
            page_posts: self.serializer.serialize_posts(&fresh),
            popular_tags: self.serializer.serialize_tags(&tags),
        })
    }

    /// One post with its comments and likes, plus the sidebars
    ///
    /// # Errors
    /// - `NotFound` if no post has this slug
    pub async fn post_detail(&self, slug: &str) -> Result<PostDetailPage, PageServiceError> {
        let detail = self.posts.post_detail(slug).await?;
        let (popular_tags, popular_posts) = self.sidebars().await?;

        Ok(PostDetailPage {
            post: self.serializer.serialize_post_detail(&detail),
            popular_tags,
            most_popular_posts: popular_posts,
        })
    }

    /// Posts carrying one tag, plus the sidebars
    ///
    /// # Errors
    /// - `NotFound` if no tag has this title
    pub async fn tag_filter(&self, tag_title: &str) -> Result<TagFilterPage, PageServiceError> {
        let tag = self
            .tags
            .get_by_title(tag_title)
            .await?
            .ok_or_else(|| PageServiceError::NotFound(format!("Tag '{}' not found", tag_title)))?;

        let posts = self
            .posts
            .posts_by_tag(&tag.title, self.limits.tag_posts)
            .await?;
        let (popular_tags, popular_posts) = self.sidebars().await?;

        Ok(TagFilterPage {
            tag: tag.title,
            posts: self.serializer.serialize_posts(&posts),
            popular_tags,
            most_popular_posts: popular_posts,
        })
    }

    pub fn contacts(&self) -> ContactsPage {
        ContactsPage::default()
    }

    async fn sidebars(&self) -> Result<(Vec<SerializedTag>, Vec<SerializedPost>), PageServiceError> {
        let tags = self.tags.popular_tags(self.limits.popular_tags).await?;
        let posts = self.posts.popular_posts(self.limits.popular_posts).await?;
        Ok((
            self.serializer.serialize_tags(&tags),
            self.serializer.serialize_posts(&posts),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::config::MediaConfig;
    use crate::db::repositories::{
        CommentRepositoryImpl, SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateCommentInput, CreatePostInput, Post, User};
    use crate::services::post::PostRepositories;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        pages: PageService,
        posts: Arc<PostService>,
        users: Arc<dyn UserRepository>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let cache = Arc::new(Cache::Memory(MemoryCache::new()));

        let users = SqlxUserRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let tags = Arc::new(TagService::new(tag_repo.clone(), cache.clone()));
        let posts = Arc::new(PostService::new(
            PostRepositories {
                posts: SqlxPostRepository::boxed(pool.clone()),
                users: users.clone(),
                tags: tag_repo,
                comments: CommentRepositoryImpl::boxed(pool.clone()),
            },
            tags.clone(),
            cache,
        ));
        let limits = PagesConfig::default();
        let serializer = Serializer::new(MediaConfig::default(), limits.teaser_length);

        Fixture {
            pages: PageService::new(posts.clone(), tags, serializer, limits),
            posts,
            users,
        }
    }

    impl Fixture {
        async fn user(&self, name: &str) -> User {
            self.users.create(&User::new(name.to_string())).await.unwrap()
        }

        async fn post(&self, slug: &str, author: &User, day: i64, tags: &[&str]) -> Post {
            let mut input = CreatePostInput::new(slug.to_uppercase(), "Text", slug, author.id);
            input.published_at =
                Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::days(day));
            input.tags = tags.iter().map(|t| t.to_string()).collect();
            self.posts.create_post(input).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_index_limits_and_orders() {
        let fx = setup().await;
        let ann = fx.user("ann").await;
        let bob = fx.user("bob").await;
        let mut created = Vec::new();
        for n in 0..7 {
            let tag = format!("t{}", n % 6);
            created.push(fx.post(&format!("p{}", n), &ann, n, &[tag.as_str()]).await);
        }
        fx.posts.add_like(created[0].id, ann.id).await.unwrap();
        fx.posts.add_like(created[0].id, bob.id).await.unwrap();
        fx.posts.add_like(created[1].id, bob.id).await.unwrap();

        let page = fx.pages.index().await.expect("Failed to build index");

        assert_eq!(page.most_popular_posts.len(), 5);
        assert_eq!(page.most_popular_posts[0].slug, "p0");
        assert_eq!(page.most_popular_posts[1].slug, "p1");

        let fresh: Vec<_> = page.page_posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(fresh, vec!["p2", "p3", "p4", "p5", "p6"]);

        assert_eq!(page.popular_tags.len(), 5);
        assert_eq!(page.popular_tags[0].title, "t0");
        assert_eq!(page.popular_tags[0].posts_with_tag, 2);
    }

    #[tokio::test]
    async fn test_index_empty_blog() {
        let fx = setup().await;
        let page = tokio_test::assert_ok!(fx.pages.index().await);
        assert!(page.most_popular_posts.is_empty());
        assert!(page.page_posts.is_empty());
        assert!(page.popular_tags.is_empty());
    }

    #[tokio::test]
    async fn test_post_detail_page() {
        let fx = setup().await;
        let ann = fx.user("ann").await;
        let bob = fx.user("bob").await;
        let post = fx.post("hello", &ann, 0, &["intro"]).await;
        fx.posts
            .add_comment(CreateCommentInput {
                post_id: post.id,
                author_id: bob.id,
                text: "First!".to_string(),
                published_at: None,
            })
            .await
            .unwrap();
        fx.posts.add_like(post.id, bob.id).await.unwrap();

        let page = fx.pages.post_detail("hello").await.expect("Failed to build page");

        assert_eq!(page.post.slug, "hello");
        assert_eq!(page.post.likes_amount, 1);
        assert_eq!(page.post.comments.len(), 1);
        assert_eq!(page.post.comments[0].author, "bob");
        assert_eq!(page.popular_tags[0].title, "intro");
        assert_eq!(page.most_popular_posts[0].slug, "hello");
    }

    #[tokio::test]
    async fn test_post_detail_page_not_found() {
        let fx = setup().await;
        let result = fx.pages.post_detail("missing").await;
        assert!(matches!(result, Err(PageServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tag_filter_page() {
        let fx = setup().await;
        let ann = fx.user("ann").await;
        for n in 0..22 {
            fx.post(&format!("r{}", n), &ann, n, &["rust"]).await;
        }
        fx.post("g", &ann, 40, &["go"]).await;

        let page = fx.pages.tag_filter("rust").await.expect("Failed to build page");

        assert_eq!(page.tag, "rust");
        assert_eq!(page.posts.len(), 20);
        assert!(page.posts.iter().all(|p| p.tags.iter().any(|t| t.title == "rust")));
        assert_eq!(page.posts[0].slug, "r21");
    }

    #[tokio::test]
    async fn test_tag_filter_page_unknown_tag() {
        let fx = setup().await;
        let err = tokio_test::assert_err!(fx.pages.tag_filter("nope").await);
        assert!(matches!(err, PageServiceError::NotFound(_)));
    }

    #[test]
    fn test_template_names() {
        assert_eq!(IndexPage::TEMPLATE, "index.html");
        assert_eq!(PostDetailPage::TEMPLATE, "post-details.html");
        assert_eq!(TagFilterPage::TEMPLATE, "posts-list.html");
        assert_eq!(ContactsPage::TEMPLATE, "contacts.html");
    }
}
