//! Scheduled-post dispatcher.
//!
//! A paced loop claims due rows through the conditional
//! `scheduled -> processing` write, pushes each claimed row through
//! intake, and records the outcome. Claim losers are rows another tick
//! already owns; they are skipped without any further writes. The loop
//! also piggybacks the TTL purge so expired request trees leave the store.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::context::PostingContext;
use crate::intake;
use crate::storage::{cleanup, scheduled};

/// A scheduler that paces loop iterations with randomized jitter.
#[derive(Debug, Clone)]
pub struct TickPacer {
    interval: Duration,
    max_jitter: Duration,
}

impl TickPacer {
    /// Create a pacer with the given base interval and jitter ceiling.
    pub fn new(interval: Duration, max_jitter: Duration) -> Self {
        Self {
            interval,
            max_jitter,
        }
    }

    /// Compute the next sleep duration: `interval + random_jitter`.
    pub fn next_delay(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return self.interval;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        self.interval + Duration::from_millis(jitter_ms)
    }

    /// Sleep until the next tick.
    pub async fn tick(&self) {
        let delay = self.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Scheduler tick sleeping");
        tokio::time::sleep(delay).await;
    }
}

/// Run the scheduler until cancellation.
pub async fn run_scheduler(ctx: Arc<PostingContext>, pacer: TickPacer, cancel: CancellationToken) {
    tracing::info!(
        interval_s = pacer.interval.as_secs(),
        "Scheduled-post dispatcher started"
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Scheduled-post dispatcher stopped");
                return;
            }
            () = pacer.tick() => {}
        }

        if let Err(e) = run_tick(&ctx).await {
            tracing::error!(error = %e, "Scheduler tick failed");
        }

        if let Err(e) = cleanup::purge_expired(&ctx.pool).await {
            tracing::error!(error = %e, "TTL purge failed");
        }
    }
}

/// One tick: claim and promote every due row.
///
/// Returns how many rows this tick promoted.
pub async fn run_tick(ctx: &PostingContext) -> Result<u32, crate::error::StorageError> {
    let due = scheduled::get_due(&ctx.pool).await?;
    if due.is_empty() {
        return Ok(0);
    }

    tracing::info!(count = due.len(), "Found scheduled posts ready to publish");
    let mut promoted = 0;

    for post in due {
        // Single-shot claim; a lost race means another tick owns the row.
        let claimed =
            scheduled::claim_for_processing(&ctx.pool, &post.user_id, &post.scheduled_post_id)
                .await?;
        if !claimed {
            tracing::debug!(
                scheduled_post_id = %post.scheduled_post_id,
                "Scheduled post already claimed, skipping"
            );
            continue;
        }

        match promote(ctx, &post).await {
            Ok(request_id) => {
                scheduled::mark_posted(
                    &ctx.pool,
                    &post.user_id,
                    &post.scheduled_post_id,
                    &request_id,
                )
                .await?;
                tracing::info!(
                    scheduled_post_id = %post.scheduled_post_id,
                    request_id = %request_id,
                    "Scheduled post promoted"
                );
                promoted += 1;
            }
            Err(error) => {
                tracing::error!(
                    scheduled_post_id = %post.scheduled_post_id,
                    error = %error,
                    "Scheduled post promotion failed"
                );
                scheduled::mark_failed(&ctx.pool, &post.user_id, &post.scheduled_post_id, &error)
                    .await?;
            }
        }
    }

    Ok(promoted)
}

/// Hand a claimed row to intake; the produced request id marks it posted.
async fn promote(ctx: &PostingContext, post: &scheduled::ScheduledPost) -> Result<String, String> {
    let destinations = post.destination_list();
    intake::submit(
        ctx,
        &post.user_id,
        &post.video_url,
        &post.caption,
        &destinations,
        post.settings_json(),
    )
    .await
    .map(|accepted| accepted.request_id)
    .map_err(|e| e.to_string())
}
