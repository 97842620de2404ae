//! Services layer - Business logic
//!
//! - `post`: popularity and freshness queries, prefetch hydration, writes
//! - `tag`: popular tags and tag lookup
//! - `serialize`: plain records handed to templates
//! - `pages`: the context of each public page

pub mod pages;
pub mod post;
pub mod serialize;
pub mod tag;

pub use pages::{
    ContactsPage, IndexPage, PageService, PageServiceError, PageTemplate, PostDetailPage,
    TagFilterPage,
};
pub use post::{is_valid_slug, PostRepositories, PostService, PostServiceError};
pub use serialize::{
    teaser, SerializedComment, SerializedPost, SerializedPostDetail, SerializedTag, Serializer,
};
pub use tag::{TagService, TagServiceError};
