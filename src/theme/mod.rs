//! Template engine
//!
//! This module provides template rendering using Tera.
//! Features:
//! - Default templates embedded in the binary
//! - Optional template directory overriding any default by name
//! - Template reload from disk
//! - Standard template variables
//! - Fallback to the error template, then to a built-in page

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::config::SiteConfig;

mod error;

pub use error::ThemeError;

/// Template rendered when a page fails to render
pub const ERROR_TEMPLATE: &str = "error.html";

/// Default templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Renders pages from the embedded templates and an optional override directory
pub struct TemplateEngine {
    tera: Tera,
    /// Directory whose `.html` files replace the embedded ones
    dir: Option<PathBuf>,
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    pub request_path: String,
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(site: &SiteConfig, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site.name.clone(),
            site_description: site.description.clone(),
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    pub fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("site_description", &self.site_description);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
    }
}

impl TemplateEngine {
    /// Create an engine from the embedded templates, overlaid with `dir`
    ///
    /// A missing `dir` is not an error; the defaults are used alone.
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        let dir = dir.map(Path::to_path_buf);
        let tera = load_templates(dir.as_deref())?;
        Ok(Self { tera, dir })
    }

    /// Re-read the override directory
    ///
    /// On failure the previously loaded templates stay active.
    pub fn reload(&mut self) -> Result<()> {
        self.tera = load_templates(self.dir.as_deref())?;
        tracing::info!("Templates reloaded");
        Ok(())
    }

    /// Whether a template with this name is loaded
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template with context
    ///
    /// # Arguments
    /// * `template` - Template name (e.g., "index.html")
    /// * `context` - Tera context with template variables
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template with the standard variables added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }

    /// Render a template, falling back on failure
    ///
    /// If `template` fails, `error.html` is rendered with the same context
    /// plus `status` (500) and `message`. If that fails too, a minimal HTML
    /// page is returned. This never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(
                    "Failed to render template '{}': {}, trying error template",
                    template,
                    e
                );

                let mut error_context = context.clone();
                error_context.insert("status", &500);
                error_context.insert("message", "Internal server error");

                match self.render(ERROR_TEMPLATE, &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!(
                            "Failed to render error template: {}, returning simple HTML error page",
                            error_template_err
                        );
                        Self::simple_error_page(template, &e.to_string())
                    }
                }
            }
        }
    }

    /// Last-resort page when both the requested template and the error
    /// template fail.
    fn simple_error_page(template: &str, error: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Template Error</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 600px;
            margin: 50px auto;
            padding: 20px;
        }}
        h1 {{ color: #c0392b; margin-top: 0; }}
    </style>
</head>
<body>
    <h1>Template Error</h1>
    <p>Failed to render template: <code>{}</code></p>
    <pre>{}</pre>
</body>
</html>"#,
            tera::escape_html(template),
            tera::escape_html(error)
        )
    }
}

/// Build a Tera instance from the embedded defaults and the override directory
fn load_templates(dir: Option<&Path>) -> Result<Tera> {
    let mut templates: BTreeMap<String, String> = BTreeMap::new();

    for name in DefaultTemplates::iter() {
        let file = DefaultTemplates::get(&name)
            .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
        let content = std::str::from_utf8(&file.data)
            .map_err(|e| ThemeError::TemplateError(format!("{} is not UTF-8: {}", name, e)))?;
        templates.insert(name.to_string(), content.to_string());
    }

    if let Some(dir) = dir {
        if dir.is_dir() {
            let mut overrides = Vec::new();
            collect_templates_from_dir(dir, dir, &mut overrides)?;
            for (name, content) in overrides {
                tracing::debug!("Template '{}' overridden from {:?}", name, dir);
                templates.insert(name, content);
            }
        } else {
            tracing::warn!("Template directory {:?} not found, using defaults", dir);
        }
    }

    let mut tera = Tera::default();
    // Adds everything before resolving `extends`, so load order doesn't matter
    tera.add_raw_templates(templates)
        .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", e)))?;
    Ok(tera)
}

/// Collect `.html` files under `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }

    Ok(())
}
