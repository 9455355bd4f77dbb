//! CRUD operations for scheduled posts.
//!
//! A row is promoted into a live upload request exactly once: the
//! `scheduled -> processing` transition is a conditional UPDATE, so when
//! two scheduler ticks race over the same due row only one claim succeeds.

use super::{now_epoch, now_iso, DbPool};
use crate::error::StorageError;

/// Retention for terminal scheduled posts before the TTL purge removes them.
pub const SCHEDULED_TTL_DAYS: i64 = 90;

/// A scheduled post row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ScheduledPost {
    /// Owning user.
    pub user_id: String,
    /// UUID of the scheduled post.
    pub scheduled_post_id: String,
    /// Public read URL of the stored video blob.
    pub video_url: String,
    /// Caption applied at every destination.
    pub caption: String,
    /// JSON array of destination identifiers.
    pub destinations: String,
    /// Optional platform-specific settings JSON, passed through to intake.
    pub platform_settings: Option<String>,
    /// When to post, epoch seconds.
    pub scheduled_time: i64,
    /// scheduled, processing, posted, cancelled, or failed.
    pub status: String,
    /// Upload request produced by promotion, once posted.
    pub request_id: Option<String>,
    /// Epoch seconds when the promotion completed.
    pub posted_at: Option<i64>,
    /// Error message when failed.
    pub error: Option<String>,
    /// ISO-8601 UTC timestamp when created.
    pub created_at: String,
    /// ISO-8601 UTC timestamp when last updated.
    pub updated_at: String,
    /// Epoch seconds after which the TTL purge may remove the row.
    pub expires_at: i64,
}

impl ScheduledPost {
    /// Parse the stored destinations JSON array.
    pub fn destination_list(&self) -> Vec<String> {
        serde_json::from_str(&self.destinations).unwrap_or_default()
    }

    /// Parse the stored platform settings JSON, if any.
    pub fn settings_json(&self) -> Option<serde_json::Value> {
        self.platform_settings
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Insert a new scheduled post. The caller validates that `scheduled_time`
/// is in the future.
pub async fn create(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
    video_url: &str,
    caption: &str,
    destinations: &[String],
    platform_settings: Option<&serde_json::Value>,
    scheduled_time: i64,
) -> Result<(), StorageError> {
    let now = now_iso();
    let expires_at = now_epoch() + SCHEDULED_TTL_DAYS * 24 * 3600;
    let destinations_json =
        serde_json::to_string(destinations).unwrap_or_else(|_| "[]".to_string());
    let settings_json = platform_settings.map(ToString::to_string);

    sqlx::query(
        "INSERT INTO scheduled_posts \
           (user_id, scheduled_post_id, video_url, caption, destinations, \
            platform_settings, scheduled_time, status, created_at, updated_at, expires_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'scheduled', ?, ?, ?)",
    )
    .bind(user_id)
    .bind(scheduled_post_id)
    .bind(video_url)
    .bind(caption)
    .bind(destinations_json)
    .bind(settings_json)
    .bind(scheduled_time)
    .bind(&now)
    .bind(&now)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Fetch a scheduled post.
pub async fn get(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
) -> Result<Option<ScheduledPost>, StorageError> {
    sqlx::query_as::<_, ScheduledPost>(
        "SELECT * FROM scheduled_posts WHERE user_id = ? AND scheduled_post_id = ?",
    )
    .bind(user_id)
    .bind(scheduled_post_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// List a user's scheduled posts, newest schedule first.
pub async fn list_by_user(
    pool: &DbPool,
    user_id: &str,
    limit: u32,
) -> Result<Vec<ScheduledPost>, StorageError> {
    sqlx::query_as::<_, ScheduledPost>(
        "SELECT * FROM scheduled_posts WHERE user_id = ? \
         ORDER BY scheduled_time DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(i64::from(limit.clamp(1, 100)))
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Fetch rows that are due: still `scheduled` with `scheduled_time <= now`.
pub async fn get_due(pool: &DbPool) -> Result<Vec<ScheduledPost>, StorageError> {
    sqlx::query_as::<_, ScheduledPost>(
        "SELECT * FROM scheduled_posts \
         WHERE status = 'scheduled' AND scheduled_time <= ? \
         ORDER BY scheduled_time ASC",
    )
    .bind(now_epoch())
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Attempt the single-shot `scheduled -> processing` claim.
///
/// Returns `true` when this caller won the row. A `false` return means
/// another tick already owns it; the caller skips with no further writes.
pub async fn claim_for_processing(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'processing', updated_at = ? \
         WHERE user_id = ? AND scheduled_post_id = ? AND status = 'scheduled'",
    )
    .bind(now_iso())
    .bind(user_id)
    .bind(scheduled_post_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}

/// Mark a claimed row as posted, recording the produced upload request.
pub async fn mark_posted(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
    request_id: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'posted', request_id = ?, posted_at = ?, updated_at = ? \
         WHERE user_id = ? AND scheduled_post_id = ?",
    )
    .bind(request_id)
    .bind(now_epoch())
    .bind(now_iso())
    .bind(user_id)
    .bind(scheduled_post_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Mark a claimed row as failed with an error message.
pub async fn mark_failed(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
    error: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'failed', error = ?, updated_at = ? \
         WHERE user_id = ? AND scheduled_post_id = ?",
    )
    .bind(error)
    .bind(now_iso())
    .bind(user_id)
    .bind(scheduled_post_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Cancel a scheduled post. Only rows still in `scheduled` can be
/// cancelled; returns whether the transition happened.
pub async fn cancel(
    pool: &DbPool,
    user_id: &str,
    scheduled_post_id: &str,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'cancelled', updated_at = ? \
         WHERE user_id = ? AND scheduled_post_id = ? AND status = 'scheduled'",
    )
    .bind(now_iso())
    .bind(user_id)
    .bind(scheduled_post_id)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected() > 0)
}
