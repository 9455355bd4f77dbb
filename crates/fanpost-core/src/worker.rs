//! The posting worker: consumes one job, runs the platform protocol, and
//! records the outcome on the destination.
//!
//! Every failure mode (unknown destination, missing account, credential
//! refresh, adapter error) ends in a terminal `failed` write with the
//! full log buffer; no code path leaves a child in `processing`. The
//! parent's overall status is recomputed after every child mutation.

use crate::context::PostingContext;
use crate::error::{CredentialError, PublishError};
use crate::platforms::tiktok::TikTokSettings;
use crate::platforms::{parse_destination, JobLog, Platform, PublishReceipt};
use crate::queue::JobMessage;
use crate::storage::requests;

/// Process a single fan-out job to completion.
pub async fn process_job(ctx: &PostingContext, job: JobMessage) {
    let mut log = JobLog::new(&job.destination);
    log.info("Starting post processing");
    log.info(format!("Request ID: {}", job.request_id));
    log.info(format!("Destination: {}", job.destination));

    // Mark the child processing and flush the opening log entries so the
    // stream is visible while the upload runs.
    write_child(ctx, &job, "processing", None, None, &mut log).await;
    recompute(ctx, &job).await;

    let outcome = run_publish(ctx, &job, &mut log).await;

    match outcome {
        Ok(receipt) => {
            log.info("Post completed successfully");
            write_child(ctx, &job, "completed", None, Some(receipt.payload), &mut log).await;
        }
        Err(error) => {
            log.error(format!("Processing failed: {error}"));
            write_child(ctx, &job, "failed", Some(error), None, &mut log).await;
        }
    }

    recompute(ctx, &job).await;
}

/// Resolve the account, freshen credentials, and dispatch to the adapter.
async fn run_publish(
    ctx: &PostingContext,
    job: &JobMessage,
    log: &mut JobLog,
) -> Result<PublishReceipt, String> {
    let Some((platform, entity_id)) = parse_destination(&job.destination) else {
        return Err(format!("unknown destination format: {}", job.destination));
    };

    log.info("Fetching account details from database");
    let account = crate::storage::accounts::get(&ctx.pool, &job.user_id, &job.destination)
        .await
        .map_err(|e| format!("account lookup failed: {e}"))?
        .ok_or_else(|| {
            format!(
                "account {} not found for user {}",
                job.destination, job.user_id
            )
        })?;
    log.info(format!("Account found: {}", account.display_name));

    let access_token = ctx
        .credentials
        .ensure_fresh(&ctx.pool, platform, &account)
        .await
        .map_err(|e| credential_failure(&e, log))?;

    dispatch(ctx, job, platform, entity_id, &account, &access_token, log)
        .await
        .map_err(|e| e.to_string())
}

/// Record a credential failure on the log buffer and render the error.
fn credential_failure(error: &CredentialError, log: &mut JobLog) -> String {
    log.error(format!("Failed to refresh token: {error}"));
    format!("credential error: {error}")
}

/// Closed dispatch over the platform tag.
async fn dispatch(
    ctx: &PostingContext,
    job: &JobMessage,
    platform: Platform,
    entity_id: &str,
    account: &crate::storage::accounts::Account,
    access_token: &str,
    log: &mut JobLog,
) -> Result<PublishReceipt, PublishError> {
    match platform {
        Platform::Facebook => {
            ctx.facebook
                .post_video(entity_id, access_token, &job.video_url, &job.caption, log)
                .await
        }
        Platform::Instagram => {
            ctx.instagram
                .post_reel(entity_id, access_token, &job.video_url, &job.caption, log)
                .await
        }
        Platform::Twitter => {
            // Both OAuth 1.0a secrets are required for signing; the token
            // secret rides in the refresh_token column.
            let token_secret =
                account
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| PublishError::Init {
                        message: "missing OAuth 1.0a access token secret".to_string(),
                    })?;
            ctx.twitter
                .post_video(access_token, token_secret, &job.video_url, &job.caption, log)
                .await
        }
        Platform::YouTube => {
            let title = if job.caption.is_empty() {
                "Untitled Short"
            } else {
                job.caption.as_str()
            };
            ctx.youtube
                .post_video(
                    access_token,
                    &job.video_url,
                    title,
                    &job.caption,
                    "public",
                    log,
                )
                .await
        }
        Platform::LinkedIn => {
            let person_urn = if entity_id.starts_with("urn:") {
                entity_id.to_string()
            } else {
                format!("urn:li:person:{entity_id}")
            };
            ctx.linkedin
                .post_video(&person_urn, access_token, &job.video_url, &job.caption, log)
                .await
        }
        Platform::TikTok => {
            let settings = TikTokSettings::from_value(job.platform_settings.as_ref());
            ctx.tiktok
                .post_video(access_token, &job.video_url, &job.caption, &settings, log)
                .await
        }
    }
}

/// Write the child's status plus whatever the log buffer holds.
async fn write_child(
    ctx: &PostingContext,
    job: &JobMessage,
    status: &str,
    error: Option<String>,
    result: Option<serde_json::Value>,
    log: &mut JobLog,
) {
    if let Err(e) = requests::update_destination(
        &ctx.pool,
        &job.request_id,
        &job.destination,
        status,
        error.as_deref(),
        result.as_ref(),
    )
    .await
    {
        tracing::error!(
            request_id = %job.request_id,
            destination = %job.destination,
            error = %e,
            "Failed to update destination status"
        );
    }

    let entries = log.take_entries();
    if let Err(e) =
        requests::append_logs(&ctx.pool, &job.request_id, &job.destination, &entries).await
    {
        tracing::error!(
            request_id = %job.request_id,
            destination = %job.destination,
            error = %e,
            "Failed to append destination logs"
        );
    }
}

/// Recompute the parent's derived status.
async fn recompute(ctx: &PostingContext, job: &JobMessage) {
    if let Err(e) = requests::recompute_parent(&ctx.pool, &job.request_id).await {
        tracing::error!(
            request_id = %job.request_id,
            error = %e,
            "Failed to recompute parent status"
        );
    }
}
