//! The posting work queue: a bounded MPSC channel between intake and the
//! worker pool.
//!
//! Intake enqueues one [`JobMessage`] per destination; `try_send` failures
//! surface immediately so a submit can roll back instead of silently
//! dropping a destination. The consumer runs jobs concurrently up to the
//! configured worker count and drains whatever is left in the channel on
//! shutdown so no accepted job is abandoned in memory.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::context::PostingContext;
use crate::worker;

/// One fan-out job: a single destination of a single upload request.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Parent upload request.
    pub request_id: String,
    /// Owning user.
    pub user_id: String,
    /// Destination identifier `"<platform>:<entity_id>"`.
    pub destination: String,
    /// Public read URL of the stored video blob.
    pub video_url: String,
    /// Caption for the post.
    pub caption: String,
    /// Opaque platform-specific settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_settings: Option<serde_json::Value>,
}

impl std::fmt::Debug for JobMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobMessage")
            .field("request_id", &self.request_id)
            .field("destination", &self.destination)
            .field("caption_len", &self.caption.len())
            .finish()
    }
}

/// Sending half of the queue, cloned into intake and the query surface.
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<JobMessage>,
}

impl JobSender {
    /// Enqueue a job without waiting. Fails when the queue is full or the
    /// consumer is gone; the caller rolls back the submit.
    pub fn enqueue(&self, job: JobMessage) -> Result<(), String> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => "posting queue is full".to_string(),
            mpsc::error::TrySendError::Closed(_) => "posting queue is closed".to_string(),
        })
    }
}

/// Create the bounded job queue. Pass the receiver to [`run_queue`].
pub fn create_job_queue(capacity: usize) -> (JobSender, mpsc::Receiver<JobMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, rx)
}

/// Run the queue consumer until cancellation.
///
/// Jobs run concurrently, bounded by `workers` permits. On cancellation
/// the channel is drained and in-flight jobs are awaited before returning,
/// so every accepted job reaches a terminal destination status.
pub async fn run_queue(
    mut receiver: mpsc::Receiver<JobMessage>,
    ctx: Arc<PostingContext>,
    workers: usize,
    cancel: CancellationToken,
) {
    tracing::info!(workers, "Posting queue consumer started");
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));

    loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Posting queue received cancellation, draining remaining jobs");
                break;
            }
            job = receiver.recv() => {
                match job {
                    Some(j) => j,
                    None => {
                        tracing::info!("Posting queue channel closed");
                        break;
                    }
                }
            }
        };

        spawn_job(job, &ctx, &semaphore).await;
    }

    // Drain anything already accepted into the channel.
    let mut drained = 0u32;
    while let Ok(job) = receiver.try_recv() {
        spawn_job(job, &ctx, &semaphore).await;
        drained += 1;
    }
    if drained > 0 {
        tracing::info!(count = drained, "Drained remaining jobs from posting queue");
    }

    // Wait for in-flight jobs by taking every permit.
    let _all = semaphore
        .acquire_many(workers.max(1) as u32)
        .await
        .expect("semaphore never closed");

    tracing::info!("Posting queue consumer stopped");
}

/// Acquire a worker slot and run the job on its own task.
async fn spawn_job(job: JobMessage, ctx: &Arc<PostingContext>, semaphore: &Arc<Semaphore>) {
    let permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .expect("semaphore never closed");
    let ctx = ctx.clone();
    tokio::spawn(async move {
        worker::process_job(&ctx, job).await;
        drop(permit);
    });
}
