//! Data models
//!
//! Database entities (User, Post, Tag, Comment), the aggregate rows used by
//! popularity queries and the hydrated `PostCard` consumed by serialization.

mod comment;
mod post;
mod tag;
mod user;

pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use post::{CreatePostInput, Post, PostCard, PostDetail, PostWithStats};
pub use tag::{Tag, TagWithCount};
pub use user::{CreateUserInput, User};
