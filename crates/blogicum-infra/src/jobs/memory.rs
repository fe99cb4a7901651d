//! In-memory job queue implementation.
//!
//! Jobs are held in a bounded channel and processed by local worker tasks.
//! Note: Jobs are lost on server restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use blogicum_core::ports::{Job, JobHandler, JobQueue, JobQueueError, JobResult, QueueStats};

/// In-memory job queue configuration.
#[derive(Debug, Clone)]
pub struct InMemoryJobQueueConfig {
    /// Maximum queue size (0 = unlimited).
    pub max_size: usize,
    /// Number of worker tasks.
    pub workers: usize,
}

impl Default for InMemoryJobQueueConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            workers: 2,
        }
    }
}

impl InMemoryJobQueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: std::env::var("JOB_QUEUE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            workers: std::env::var("JOB_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
        }
    }
}

#[derive(Default)]
struct JobStats {
    pending: AtomicUsize,
    processing: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// In-memory job queue.
pub struct InMemoryJobQueue {
    stats: Arc<JobStats>,
    config: InMemoryJobQueueConfig,
    job_sender: mpsc::Sender<Job>,
    job_receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl InMemoryJobQueue {
    pub fn new(config: InMemoryJobQueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.max_size.max(100));

        Self {
            stats: Arc::new(JobStats::default()),
            config,
            job_sender: tx,
            job_receiver: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(InMemoryJobQueueConfig::from_env())
    }
}

async fn run_worker(
    worker_id: usize,
    handler: JobHandler,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    sender: mpsc::Sender<Job>,
    stats: Arc<JobStats>,
) {
    tracing::info!("Job worker {} started", worker_id);

    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };

        let Some(mut job) = job else {
            tracing::info!("Job worker {} shutting down", worker_id);
            break;
        };

        stats.pending.fetch_sub(1, Ordering::Relaxed);
        stats.processing.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            worker = worker_id,
            job_id = %job.id,
            job_type = %job.job_type,
            "Processing job"
        );

        job.attempts += 1;
        let result = handler(job.clone()).await;

        stats.processing.fetch_sub(1, Ordering::Relaxed);

        match result {
            JobResult::Success => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(job_id = %job.id, "Job completed successfully");
            }
            JobResult::Retry(reason) if job.attempts < job.max_attempts => {
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    reason = %reason,
                    "Job failed, will retry"
                );
                stats.pending.fetch_add(1, Ordering::Relaxed);

                // Back off a little before the job is visible again.
                let sender = sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        100 * job.attempts as u64,
                    ))
                    .await;
                    if let Err(e) = sender.send(job).await {
                        tracing::error!("Failed to re-enqueue job for retry: {}", e);
                    }
                });
            }
            JobResult::Retry(reason) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job_id = %job.id, reason = %reason, "Job failed after max retries");
            }
            JobResult::Failed(reason) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(job_id = %job.id, reason = %reason, "Job failed permanently");
            }
        }
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), JobQueueError> {
        if self.config.max_size > 0 {
            let current_size = self.stats.pending.load(Ordering::Relaxed);
            if current_size >= self.config.max_size {
                return Err(JobQueueError::QueueFull);
            }
        }

        self.stats.pending.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.job_sender.try_send(job) {
            self.stats.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => JobQueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => {
                    JobQueueError::EnqueueError("queue closed".to_string())
                }
            });
        }

        tracing::debug!(
            "Job enqueued. Queue size: {}",
            self.stats.pending.load(Ordering::Relaxed)
        );

        Ok(())
    }

    async fn start_worker(&self, handler: JobHandler) -> Result<(), JobQueueError> {
        for worker_id in 0..self.config.workers.max(1) {
            tokio::spawn(run_worker(
                worker_id,
                handler.clone(),
                self.job_receiver.clone(),
                self.job_sender.clone(),
                self.stats.clone(),
            ));
        }

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        Ok(QueueStats {
            pending: self.stats.pending.load(Ordering::Relaxed),
            processing: self.stats.processing.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    fn handler_returning(make: fn() -> JobResult) -> JobHandler {
        Arc::new(
            move |_job: Job| -> Pin<Box<dyn Future<Output = JobResult> + Send>> {
                Box::pin(async move { make() })
            },
        )
    }

    async fn settle(queue: &InMemoryJobQueue, done: impl Fn(&QueueStats) -> bool) -> QueueStats {
        for _ in 0..100 {
            let stats = queue.stats().await.unwrap();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        queue.stats().await.unwrap()
    }

    #[tokio::test]
    async fn full_queue_rejects() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig {
            max_size: 1,
            workers: 1,
        });
        queue
            .enqueue(Job::new("noop", serde_json::Value::Null))
            .await
            .unwrap();
        let second = queue.enqueue(Job::new("noop", serde_json::Value::Null)).await;
        assert!(matches!(second, Err(JobQueueError::QueueFull)));
    }

    #[tokio::test]
    async fn workers_drain_the_queue() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig::default());
        queue
            .start_worker(handler_returning(|| JobResult::Success))
            .await
            .unwrap();

        for _ in 0..3 {
            queue
                .enqueue(Job::new("noop", serde_json::Value::Null))
                .await
                .unwrap();
        }

        let stats = settle(&queue, |s| s.completed == 3).await;
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let queue = InMemoryJobQueue::new(InMemoryJobQueueConfig::default());
        queue
            .start_worker(handler_returning(|| JobResult::Retry("unavailable".to_string())))
            .await
            .unwrap();

        queue
            .enqueue(Job::new("flaky", serde_json::Value::Null).with_max_attempts(2))
            .await
            .unwrap();

        let stats = settle(&queue, |s| s.failed == 1).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
    }
}
