//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use blogicum_core::pagination::DEFAULT_PAGE_SIZE;

#[cfg(feature = "postgres")]
use blogicum_infra::DatabaseConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs on the in-memory store.
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    pub posts_per_page: usize,
    /// Moderation notices go here when set, to the log otherwise.
    pub moderation_webhook_url: Option<String>,
    /// Uploaded post images live under here.
    pub media_root: PathBuf,
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        #[cfg(feature = "postgres")]
        let database = env::var("DATABASE_URL").ok().map(|url| {
            let mut config = DatabaseConfig::new(url);
            if let Some(max) = parsed("DB_MAX_CONNECTIONS") {
                config.max_connections = max;
            }
            if let Some(min) = parsed("DB_MIN_CONNECTIONS") {
                config.min_connections = min;
            }
            config
        });

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT").unwrap_or(8080),
            #[cfg(feature = "postgres")]
            database,
            posts_per_page: parsed("POSTS_PER_PAGE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            moderation_webhook_url: env::var("MODERATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
        }
    }
}
