//! Page handlers
//!
//! Thin wrappers: assemble the page, render its template with the standard
//! variables and attach an ETag.

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::Response,
};
use std::sync::PoisonError;
use tera::Context as TeraContext;

use super::middleware::{html_with_etag, AppState, PageError};
use crate::services::pages::PageTemplate;
use crate::theme::StandardTemplateVars;

/// GET /
pub async fn index(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let page = state.pages.index().await?;
    render_page(&state, &uri, &headers, &page)
}

/// GET /posts/{slug}/
pub async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let page = state.pages.post_detail(&slug).await?;
    render_page(&state, &uri, &headers, &page)
}

/// GET /tags/{title}/
pub async fn tag_filter(
    State(state): State<AppState>,
    Path(title): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let page = state.pages.tag_filter(&title).await?;
    render_page(&state, &uri, &headers, &page)
}

/// GET /contacts/
pub async fn contacts(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let page = state.pages.contacts();
    render_page(&state, &uri, &headers, &page)
}

/// Any unrouted path
pub async fn not_found(uri: Uri) -> PageError {
    PageError::NotFound(format!("No route for {}", uri.path()))
}

fn render_page<T: PageTemplate>(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    page: &T,
) -> Result<Response, PageError> {
    let context = TeraContext::from_serialize(page)
        .with_context(|| format!("Failed to build context for {}", T::TEMPLATE))?;
    let vars = StandardTemplateVars::new(&state.site, uri.path());

    let html = state
        .theme_engine
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .render_with_standard_vars(T::TEMPLATE, &context, &vars)?;

    Ok(html_with_etag(headers, html))
}
