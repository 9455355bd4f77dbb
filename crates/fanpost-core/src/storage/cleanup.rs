//! TTL purge for expired rows.
//!
//! Upload requests carry a 90-day expiry; destination rows and logs go
//! with the parent via cascade. Scheduled posts are purged once expired
//! and terminal. A still-`scheduled` row is never removed, however old;
//! cancellation is a user decision.

use super::{now_epoch, DbPool};
use crate::error::StorageError;

/// Rows removed by one purge pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Expired upload request trees removed.
    pub upload_requests: u64,
    /// Expired terminal scheduled posts removed.
    pub scheduled_posts: u64,
}

/// Delete rows whose TTL has passed. Returns counts for logging.
pub async fn purge_expired(pool: &DbPool) -> Result<PurgeStats, StorageError> {
    let now = now_epoch();

    let requests = sqlx::query("DELETE FROM upload_requests WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?
        .rows_affected();

    let scheduled = sqlx::query(
        "DELETE FROM scheduled_posts \
         WHERE expires_at <= ? AND status IN ('posted', 'cancelled', 'failed')",
    )
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .rows_affected();

    if requests > 0 || scheduled > 0 {
        tracing::info!(
            upload_requests = requests,
            scheduled_posts = scheduled,
            "Purged expired rows"
        );
    }

    Ok(PurgeStats {
        upload_requests: requests,
        scheduled_posts: scheduled,
    })
}
