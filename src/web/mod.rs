//! Web layer - HTTP routing and page handlers
//!
//! Routes:
//! - `/` index page
//! - `/posts/{slug}/` post detail page
//! - `/tags/{title}/` tag filter page
//! - `/contacts/` static contacts page
//! - `/media/*` uploaded post images
//!
//! The trailing slash is optional. Every other path gets the 404 page.

pub mod middleware;
pub mod pages;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::config::MediaConfig;

pub use middleware::{etag_matches, generate_etag, AppState, PageError};

/// Build the application router
pub fn build_router(state: AppState, media: &MediaConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(pages::index))
        .route("/posts/{slug}", get(pages::post_detail))
        .route("/posts/{slug}/", get(pages::post_detail))
        .route("/tags/{title}", get(pages::tag_filter))
        .route("/tags/{title}/", get(pages::tag_filter))
        .route("/contacts", get(pages::contacts))
        .route("/contacts/", get(pages::contacts));

    match media_mount_path(&media.url_prefix) {
        Some(mount) => {
            tracing::info!("Serving media from {:?} at {}", media.path, mount);
            router = router.nest_service(&mount, ServeDir::new(&media.path));
        }
        None => tracing::info!(
            "Media prefix {} is not a local path, media is not served",
            media.url_prefix
        ),
    }

    router
        .fallback(pages::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Route to mount the media directory on, `None` for external prefixes
fn media_mount_path(url_prefix: &str) -> Option<String> {
    let trimmed = url_prefix.trim_end_matches('/');
    if !trimmed.starts_with('/') || trimmed.starts_with("//") || trimmed.contains("://") {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_mount_path() {
        assert_eq!(media_mount_path("/media/").as_deref(), Some("/media"));
        assert_eq!(media_mount_path("/static/img").as_deref(), Some("/static/img"));
        assert_eq!(media_mount_path("https://cdn.example.com/m/"), None);
        assert_eq!(media_mount_path("//cdn.example.com/m/"), None);
        assert_eq!(media_mount_path("/"), None);
    }
}
