//! Moderation notices.
//!
//! Notices travel through the job queue so the request that rejected a
//! comment never waits on delivery. A worker hands each one to a
//! [`ModerationSink`]: a webhook when one is configured, the log otherwise.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use blogicum_core::ports::{
    Job, JobHandler, JobQueue, JobResult, ModerationNotice, ModerationNotifier, NotifyError,
};

/// Job type carrying a serialized [`ModerationNotice`].
pub const SHORT_COMMENT_JOB: &str = "moderation.short_comment";

/// Where moderation notices end up.
#[async_trait]
pub trait ModerationSink: Send + Sync {
    async fn deliver(&self, notice: &ModerationNotice) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to deliver moderation notice: {0}")]
    Delivery(String),
}

/// Writes notices to the log (for development).
pub struct LogSink;

#[async_trait]
impl ModerationSink for LogSink {
    async fn deliver(&self, notice: &ModerationNotice) -> Result<(), SinkError> {
        tracing::warn!(
            post_id = notice.post_id,
            author_id = notice.author_id,
            reason = %notice.reason,
            text = %notice.text,
            "Moderation notice"
        );
        Ok(())
    }
}

/// Posts notices as JSON to a webhook URL.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModerationSink for WebhookSink {
    async fn deliver(&self, notice: &ModerationNotice) -> Result<(), SinkError> {
        let payload = serde_json::json!({
            "text": format!(
                "Moderation: {} on post {} by user {}: {:?}",
                notice.reason, notice.post_id, notice.author_id, notice.text
            ),
            "notice": notice,
        });

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SinkError::Delivery(e.to_string()))?;

        Ok(())
    }
}

/// [`ModerationNotifier`] that enqueues notices as background jobs.
pub struct QueuedModerationNotifier {
    queue: Arc<dyn JobQueue>,
}

impl QueuedModerationNotifier {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ModerationNotifier for QueuedModerationNotifier {
    async fn notify(&self, notice: ModerationNotice) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_value(&notice).map_err(|e| NotifyError::Dispatch(e.to_string()))?;

        self.queue
            .enqueue(Job::new(SHORT_COMMENT_JOB, payload))
            .await
            .map_err(|e| NotifyError::Dispatch(e.to_string()))
    }
}

/// Worker handler delivering queued notices to `sink`.
///
/// Sink failures are retried; unknown job types and malformed payloads fail
/// for good.
pub fn moderation_job_handler(sink: Arc<dyn ModerationSink>) -> JobHandler {
    Arc::new(
        move |job: Job| -> Pin<Box<dyn Future<Output = JobResult> + Send>> {
            let sink = sink.clone();
            Box::pin(async move {
                if job.job_type != SHORT_COMMENT_JOB {
                    return JobResult::Failed(format!("unknown job type {}", job.job_type));
                }

                let notice: ModerationNotice = match serde_json::from_value(job.payload) {
                    Ok(notice) => notice,
                    Err(e) => return JobResult::Failed(e.to_string()),
                };

                match sink.deliver(&notice).await {
                    Ok(()) => JobResult::Success,
                    Err(e) => JobResult::Retry(e.to_string()),
                }
            })
        },
    )
}
