//! # Blogicum Infrastructure
//!
//! Concrete implementations of the ports defined in `blogicum-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory store only
//! - `postgres` - PostgreSQL entity store via SeaORM
//! - `auth` - JWT + Argon2 identity services

pub mod database;
pub mod jobs;
pub mod moderation;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use database::InMemoryStore;
pub use jobs::{InMemoryJobQueue, InMemoryJobQueueConfig};
pub use moderation::{
    LogSink, ModerationSink, QueuedModerationNotifier, SinkError, WebhookSink,
    moderation_job_handler,
};

#[cfg(feature = "auth")]
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConfig, postgres_repositories};
