//! Inkblog - a small blog front

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkblog::{
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            CommentRepositoryImpl, SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
        },
    },
    services::{
        pages::PageService,
        post::{PostRepositories, PostService},
        serialize::Serializer,
        tag::TagService,
    },
    theme::TemplateEngine,
    web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkblog=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting inkblog...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Initialize cache
    let cache = create_cache(&config.cache)?;
    tracing::info!("Cache initialized: {:?}", config.cache.driver);

    // Create repositories
    let tag_repo = SqlxTagRepository::boxed(pool.clone());
    let repos = PostRepositories {
        posts: SqlxPostRepository::boxed(pool.clone()),
        users: SqlxUserRepository::boxed(pool.clone()),
        tags: tag_repo.clone(),
        comments: CommentRepositoryImpl::boxed(pool.clone()),
    };

    // Initialize services
    let tag_service = Arc::new(TagService::new(tag_repo, cache.clone()));
    let post_service = Arc::new(PostService::new(repos, tag_service.clone(), cache));
    let page_service = Arc::new(PageService::new(
        post_service,
        tag_service,
        Serializer::from_config(&config.media, &config.pages),
        config.pages.clone(),
    ));

    // Load templates
    let theme_engine = TemplateEngine::new(config.theme.path.as_deref())?;
    tracing::info!("Templates loaded");

    let state = AppState::new(page_service, theme_engine, config.site.clone());

    #[cfg(unix)]
    spawn_template_reloader(state.clone());

    // Build router
    let app = web::build_router(state, &config.media);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Reload templates from the theme directory on SIGHUP
#[cfg(unix)]
fn spawn_template_reloader(state: AppState) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Failed to listen for SIGHUP: {}", e);
                return;
            }
        };
        while hangup.recv().await.is_some() {
            if let Err(e) = state.reload_templates() {
                tracing::error!("Failed to reload templates: {:#}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
