//! Moderation side channel.
//!
//! Rejected one-word comments are reported here so moderators can see them.
//! Delivery is best effort: callers log and drop any [`NotifyError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PostId, UserId};

/// What moderators get told about a rejected submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationNotice {
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl ModerationNotice {
    pub fn short_comment(post_id: PostId, author_id: UserId, text: impl Into<String>) -> Self {
        Self {
            post_id,
            author_id,
            text: text.into(),
            reason: "single-word comment".to_string(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ModerationNotifier: Send + Sync {
    /// Hand the notice off for delivery. Must not wait for the delivery itself.
    async fn notify(&self, notice: ModerationNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to dispatch moderation notice: {0}")]
    Dispatch(String),
}
