//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod job_queue;
mod moderation;
mod repository;

pub use auth::{AuthError, PasswordService, TokenClaims, TokenService};
pub use job_queue::{Job, JobHandler, JobQueue, JobQueueError, JobResult, QueueStats};
pub use moderation::{ModerationNotice, ModerationNotifier, NotifyError};
pub use repository::{
    BaseRepository, CategoryRepository, CommentRepository, LocationRepository, PostRepository,
    Repositories, UserRepository,
};
