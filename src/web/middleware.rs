//! Web middleware
//!
//! Contains:
//! - Shared application state
//! - The page error type and the middleware that renders it as HTML
//! - ETag helpers for conditional GETs

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::{Arc, PoisonError, RwLock};
use tera::Context as TeraContext;

use crate::config::SiteConfig;
use crate::services::pages::{PageService, PageServiceError};
use crate::theme::{StandardTemplateVars, TemplateEngine, ERROR_TEMPLATE};

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub pages: Arc<PageService>,
    pub theme_engine: Arc<RwLock<TemplateEngine>>,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    pub fn new(pages: Arc<PageService>, theme_engine: TemplateEngine, site: SiteConfig) -> Self {
        Self {
            pages,
            theme_engine: Arc::new(RwLock::new(theme_engine)),
            site: Arc::new(site),
        }
    }

    /// Re-read the template directory
    pub fn reload_templates(&self) -> anyhow::Result<()> {
        self.theme_engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .reload()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error returned by page handlers
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to visitors
    fn public_message(&self) -> &'static str {
        match self {
            PageError::NotFound(_) => "Page not found",
            PageError::Internal(_) => "Internal server error",
        }
    }
}

impl From<PageServiceError> for PageError {
    fn from(err: PageServiceError) -> Self {
        match err {
            PageServiceError::NotFound(msg) => PageError::NotFound(msg),
            PageServiceError::InternalError(e) => PageError::Internal(e),
        }
    }
}

/// Marker left on error responses for `render_error_pages`
#[derive(Debug, Clone)]
struct ErrorPage {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match &self {
            PageError::NotFound(msg) => tracing::debug!("Not found: {}", msg),
            PageError::Internal(e) => tracing::error!("Page failed: {:#}", e),
        }

        let page = ErrorPage {
            status: self.status(),
            message: self.public_message(),
        };
        let mut response = (page.status, page.message).into_response();
        response.extensions_mut().insert(page);
        response
    }
}

/// Replace `PageError` responses with the rendered error template
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut context = TeraContext::new();
    StandardTemplateVars::new(&state.site, path).insert_into(&mut context);
    context.insert("status", &page.status.as_u16());
    context.insert("message", page.message);

    let html = state
        .theme_engine
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .render_with_fallback(ERROR_TEMPLATE, &context);

    (page.status, Html(html)).into_response()
}

// ============================================================================
// ETag
// ============================================================================

/// Generate ETag from content
pub fn generate_etag(content: &[u8]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// Check an `If-None-Match` value against a response ETag
///
/// Accepts `*`, comma-separated lists and weak validators.
pub fn etag_matches(request_etag: Option<&str>, response_etag: &str) -> bool {
    let Some(request_etag) = request_etag else {
        return false;
    };
    let normalized_response = response_etag.trim_start_matches("W/");

    request_etag.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/") == normalized_response
    })
}

/// An HTML response with an ETag, or `304` when the client already has it
pub fn html_with_etag(request_headers: &HeaderMap, html: String) -> Response {
    let etag = generate_etag(html.as_bytes());
    let if_none_match = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    if etag_matches(if_none_match, &etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    (
        StatusCode::OK,
        [
            (header::ETAG, etag),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Html(html),
    )
        .into_response()
}
