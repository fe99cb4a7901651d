//! Application state - shared across all handlers.

use std::sync::Arc;

use blogicum_core::BlogService;
use blogicum_core::ports::{JobQueue, PasswordService, Repositories, TokenService};
use blogicum_infra::{
    Argon2PasswordService, InMemoryJobQueue, InMemoryStore, JwtConfig, JwtTokenService, LogSink,
    ModerationSink, QueuedModerationNotifier, WebhookSink, moderation_job_handler,
};

use crate::config::AppConfig;
use crate::media::MediaStore;
use crate::render::{JsonRenderer, Renderer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub blog: Arc<BlogService>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub renderer: Arc<dyn Renderer>,
    pub jobs: Arc<dyn JobQueue>,
    pub media: Arc<MediaStore>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let repos = Self::repositories(config).await;

        let sink: Arc<dyn ModerationSink> = match &config.moderation_webhook_url {
            Some(url) => {
                tracing::info!("Moderation webhook configured");
                Arc::new(WebhookSink::new(url.clone()))
            }
            None => Arc::new(LogSink),
        };

        let jobs: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::from_env());
        if let Err(e) = jobs.start_worker(moderation_job_handler(sink)).await {
            tracing::error!("Failed to start moderation workers: {}", e);
        }

        let media = MediaStore::new(config.media_root.clone());
        tracing::info!(media_root = %media.root().display(), "Storing uploads");

        let state = Self::assemble(
            repos,
            jobs,
            JwtConfig::from_env(),
            Arc::new(JsonRenderer),
            media,
            config.posts_per_page,
        );

        tracing::info!("Application state initialized");
        state
    }

    /// Wire the services around an entity store and a job queue.
    pub fn assemble(
        repos: Repositories,
        jobs: Arc<dyn JobQueue>,
        jwt: JwtConfig,
        renderer: Arc<dyn Renderer>,
        media: MediaStore,
        posts_per_page: usize,
    ) -> Self {
        let notifier = Arc::new(QueuedModerationNotifier::new(jobs.clone()));
        let blog = BlogService::new(repos, notifier).with_page_size(posts_per_page);

        Self {
            blog: Arc::new(blog),
            tokens: Arc::new(JwtTokenService::new(jwt)),
            passwords: Arc::new(Argon2PasswordService::new()),
            renderer,
            jobs,
            media: Arc::new(media),
        }
    }

    #[cfg(feature = "postgres")]
    async fn repositories(config: &AppConfig) -> Repositories {
        let Some(db_config) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Repositories::from_store(Arc::new(InMemoryStore::new()));
        };

        match db_config.connect().await {
            Ok(conn) => blogicum_infra::postgres_repositories(conn),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
                Repositories::from_store(Arc::new(InMemoryStore::new()))
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn repositories(_config: &AppConfig) -> Repositories {
        tracing::info!("Running without postgres feature - using in-memory store");
        Repositories::from_store(Arc::new(InMemoryStore::new()))
    }
}
