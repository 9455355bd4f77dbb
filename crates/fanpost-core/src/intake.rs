//! Fan-out intake: accept a publish request, create the request tree, and
//! enqueue one job per destination.
//!
//! The request is not accepted until every job message is enqueued: if any
//! enqueue fails, the parent row is deleted again (compensating write) and
//! the whole submit fails.

use crate::context::PostingContext;
use crate::error::IntakeError;
use crate::platforms::parse_destination;
use crate::queue::JobMessage;
use crate::storage::{accounts, requests};

/// The synchronous acceptance returned to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitAccepted {
    /// UUID of the created request.
    pub request_id: String,
    /// Always `"queued"` at acceptance time.
    pub status: String,
    /// The destinations actually fanned out (unknown accounts dropped).
    pub destinations: Vec<String>,
    /// Public read URL handed to the workers.
    pub video_url: String,
    /// ISO-8601 UTC timestamp of acceptance.
    pub created_at: String,
}

/// Accept a publish request and fan it out.
///
/// Destinations must be well-formed `"<platform>:<entity_id>"` strings;
/// ones that do not match a connected account are dropped. An empty
/// survivor set is an input error.
pub async fn submit(
    ctx: &PostingContext,
    user_id: &str,
    video_url: &str,
    caption: &str,
    destinations: &[String],
    platform_settings: Option<serde_json::Value>,
) -> Result<SubmitAccepted, IntakeError> {
    // Validate format first: a malformed identifier is a caller bug, not a
    // missing account.
    for destination in destinations {
        if parse_destination(destination).is_none() {
            return Err(IntakeError::BadDestination {
                destination: destination.clone(),
            });
        }
    }

    // Keep only destinations the user has actually connected.
    let mut valid = Vec::new();
    for destination in destinations {
        match accounts::get(&ctx.pool, user_id, destination).await? {
            Some(_) => valid.push(destination.clone()),
            None => {
                tracing::warn!(
                    user_id,
                    destination = %destination,
                    "Dropping destination with no connected account"
                );
            }
        }
    }

    if valid.is_empty() {
        return Err(IntakeError::NoDestinations);
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let parent =
        requests::create_parent(&ctx.pool, &request_id, user_id, video_url, caption, &valid)
            .await?;

    // Enqueue one job per destination. Failure rolls the whole submit back.
    for destination in &valid {
        let job = JobMessage {
            request_id: request_id.clone(),
            user_id: user_id.to_string(),
            destination: destination.clone(),
            video_url: video_url.to_string(),
            caption: caption.to_string(),
            platform_settings: platform_settings
                .as_ref()
                .filter(|_| destination.starts_with("tiktok:"))
                .cloned(),
        };

        if let Err(message) = ctx.jobs.enqueue(job) {
            tracing::error!(
                request_id = %request_id,
                destination = %destination,
                "Enqueue failed, rolling back submit"
            );
            requests::delete_parent(&ctx.pool, &request_id).await?;
            return Err(IntakeError::Enqueue {
                destination: destination.clone(),
                message,
            });
        }
    }

    tracing::info!(
        request_id = %request_id,
        destinations = valid.len(),
        "Publish request accepted"
    );

    Ok(SubmitAccepted {
        request_id,
        status: "queued".to_string(),
        destinations: valid,
        video_url: video_url.to_string(),
        created_at: parent.created_at,
    })
}
