//! The upload-request tree: parent rows, per-destination children, and the
//! append-only destination log stream.
//!
//! Children are mutated one row at a time so workers for different
//! destinations of the same request never contend. The parent's overall
//! status is always the pure derivation in [`derive_overall`], written
//! unconditionally; concurrent recomputation is idempotent.

use super::{now_epoch, now_iso, DbPool};
use crate::error::StorageError;

/// Retention for upload requests before the TTL purge removes them.
pub const REQUEST_TTL_DAYS: i64 = 90;

/// An upload request parent row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UploadRequest {
    /// UUID of the request.
    pub request_id: String,
    /// Owning user.
    pub user_id: String,
    /// Public read URL of the stored video blob.
    pub video_url: String,
    /// Caption applied at every destination.
    pub caption: String,
    /// Overall status derived from the children: queued, processing,
    /// completed, or failed.
    pub status: String,
    /// ISO-8601 UTC timestamp when created.
    pub created_at: String,
    /// ISO-8601 UTC timestamp when last updated.
    pub updated_at: String,
    /// Epoch seconds after which the TTL purge may remove the row.
    pub expires_at: i64,
}

/// A per-destination child row.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DestinationRecord {
    /// Parent request.
    pub request_id: String,
    /// Destination identifier `"<platform>:<entity_id>"`.
    pub destination: String,
    /// queued, processing, completed, or failed.
    pub status: String,
    /// Terminal error string when failed.
    pub error: Option<String>,
    /// Platform-specific terminal identifiers as a JSON document.
    pub result: Option<String>,
    /// ISO-8601 UTC timestamp when created.
    pub created_at: String,
    /// ISO-8601 UTC timestamp when last updated.
    pub updated_at: String,
}

impl DestinationRecord {
    /// Parse the stored `result` JSON, if any.
    pub fn result_json(&self) -> Option<serde_json::Value> {
        self.result
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// One entry in a destination's append-only log stream.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// ISO-8601 UTC timestamp of the entry.
    pub timestamp: String,
    /// INFO, WARNING, or ERROR.
    pub level: String,
    /// Log line.
    pub message: String,
}

impl LogEntry {
    /// Build an entry stamped with the current time.
    pub fn now(level: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: now_iso(),
            level: level.to_string(),
            message: message.into(),
        }
    }
}

/// Derive the parent's overall status from its children.
///
/// Single authoritative rule: processing if any child is processing, else
/// failed if any failed, else completed if all completed, else queued.
/// Pure and idempotent; safe to recompute concurrently.
pub fn derive_overall<'a, I>(statuses: I) -> &'static str
where
    I: IntoIterator<Item = &'a str>,
{
    let mut any_processing = false;
    let mut any_failed = false;
    let mut all_completed = true;
    let mut empty = true;

    for status in statuses {
        empty = false;
        match status {
            "processing" => any_processing = true,
            "failed" => any_failed = true,
            _ => {}
        }
        if status != "completed" {
            all_completed = false;
        }
    }

    if any_processing {
        "processing"
    } else if any_failed {
        "failed"
    } else if all_completed && !empty {
        "completed"
    } else {
        "queued"
    }
}

/// Create a parent row with all destination children pre-initialized to
/// `queued` and empty logs. Written in one transaction so a half-created
/// tree is never observable.
pub async fn create_parent(
    pool: &DbPool,
    request_id: &str,
    user_id: &str,
    video_url: &str,
    caption: &str,
    destinations: &[String],
) -> Result<UploadRequest, StorageError> {
    let now = now_iso();
    let expires_at = now_epoch() + REQUEST_TTL_DAYS * 24 * 3600;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    sqlx::query(
        "INSERT INTO upload_requests \
           (request_id, user_id, video_url, caption, status, created_at, updated_at, expires_at) \
         VALUES (?, ?, ?, ?, 'queued', ?, ?, ?)",
    )
    .bind(request_id)
    .bind(user_id)
    .bind(video_url)
    .bind(caption)
    .bind(&now)
    .bind(&now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    for destination in destinations {
        sqlx::query(
            "INSERT INTO upload_destinations \
               (request_id, destination, status, created_at, updated_at) \
             VALUES (?, ?, 'queued', ?, ?)",
        )
        .bind(request_id)
        .bind(destination)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    }

    tx.commit()
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(UploadRequest {
        request_id: request_id.to_string(),
        user_id: user_id.to_string(),
        video_url: video_url.to_string(),
        caption: caption.to_string(),
        status: "queued".to_string(),
        created_at: now.clone(),
        updated_at: now,
        expires_at,
    })
}

/// Delete a parent and (via cascade) its children and logs.
///
/// Used as the compensating write when enqueueing fan-out jobs fails
/// mid-submit.
pub async fn delete_parent(pool: &DbPool, request_id: &str) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM upload_requests WHERE request_id = ?")
        .bind(request_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Fetch a parent row.
pub async fn get(pool: &DbPool, request_id: &str) -> Result<Option<UploadRequest>, StorageError> {
    sqlx::query_as::<_, UploadRequest>("SELECT * FROM upload_requests WHERE request_id = ?")
        .bind(request_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// Fetch all destination children of a request.
pub async fn get_destinations(
    pool: &DbPool,
    request_id: &str,
) -> Result<Vec<DestinationRecord>, StorageError> {
    sqlx::query_as::<_, DestinationRecord>(
        "SELECT * FROM upload_destinations WHERE request_id = ? ORDER BY destination ASC",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Fetch a single destination child.
pub async fn get_destination(
    pool: &DbPool,
    request_id: &str,
    destination: &str,
) -> Result<Option<DestinationRecord>, StorageError> {
    sqlx::query_as::<_, DestinationRecord>(
        "SELECT * FROM upload_destinations WHERE request_id = ? AND destination = ?",
    )
    .bind(request_id)
    .bind(destination)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// A page of a user's requests, newest first.
#[derive(Debug)]
pub struct RequestPage {
    /// Parent rows in this page.
    pub requests: Vec<UploadRequest>,
    /// Cursor for the next page: pass back as `cursor` to continue.
    /// `None` when this page exhausted the result set.
    pub next_cursor: Option<String>,
}

/// List a user's requests newest-first with cursor pagination.
///
/// The cursor is the `created_at` stamp of the last row of the previous
/// page; continuation is strictly-older-than.
pub async fn list_by_user(
    pool: &DbPool,
    user_id: &str,
    limit: u32,
    cursor: Option<&str>,
) -> Result<RequestPage, StorageError> {
    let limit = i64::from(limit.clamp(1, 100));

    let rows = match cursor {
        Some(before) => {
            sqlx::query_as::<_, UploadRequest>(
                "SELECT * FROM upload_requests \
                 WHERE user_id = ? AND created_at < ? \
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(user_id)
            .bind(before)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, UploadRequest>(
                "SELECT * FROM upload_requests \
                 WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
    .map_err(|e| StorageError::Query { source: e })?;

    let next_cursor = if rows.len() as i64 == limit {
        rows.last().map(|r| r.created_at.clone())
    } else {
        None
    };

    Ok(RequestPage {
        requests: rows,
        next_cursor,
    })
}

/// Update one destination child's slot: status plus optional error/result.
///
/// A single-row UPDATE that never touches sibling destinations. Passing
/// `error: None` leaves an existing error in place; clearing is the
/// resubmit path's job.
pub async fn update_destination(
    pool: &DbPool,
    request_id: &str,
    destination: &str,
    status: &str,
    error: Option<&str>,
    result: Option<&serde_json::Value>,
) -> Result<(), StorageError> {
    let result_text = result.map(ToString::to_string);

    sqlx::query(
        "UPDATE upload_destinations \
         SET status = ?, \
             error = COALESCE(?, error), \
             result = COALESCE(?, result), \
             updated_at = ? \
         WHERE request_id = ? AND destination = ?",
    )
    .bind(status)
    .bind(error)
    .bind(result_text)
    .bind(now_iso())
    .bind(request_id)
    .bind(destination)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Append log entries to a destination's stream, preserving order.
///
/// Sequence numbers continue from the current maximum; existing entries are
/// never modified or removed.
pub async fn append_logs(
    pool: &DbPool,
    request_id: &str,
    destination: &str,
    entries: &[LogEntry],
) -> Result<(), StorageError> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    let (next_seq,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(seq), -1) + 1 FROM destination_logs \
         WHERE request_id = ? AND destination = ?",
    )
    .bind(request_id)
    .bind(destination)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    for (i, entry) in entries.iter().enumerate() {
        sqlx::query(
            "INSERT INTO destination_logs \
               (request_id, destination, seq, timestamp, level, message) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(request_id)
        .bind(destination)
        .bind(next_seq + i as i64)
        .bind(&entry.timestamp)
        .bind(&entry.level)
        .bind(&entry.message)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    }

    tx.commit()
        .await
        .map_err(|e| StorageError::Query { source: e })
}

/// Read a destination's log stream in append order.
pub async fn get_logs(
    pool: &DbPool,
    request_id: &str,
    destination: &str,
) -> Result<Vec<LogEntry>, StorageError> {
    sqlx::query_as::<_, LogEntry>(
        "SELECT timestamp, level, message FROM destination_logs \
         WHERE request_id = ? AND destination = ? ORDER BY seq ASC",
    )
    .bind(request_id)
    .bind(destination)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })
}

/// Re-derive and write the parent's overall status from its children.
///
/// The write is unconditional; last writer wins without harm because the
/// derivation is a pure function of the children.
pub async fn recompute_parent(pool: &DbPool, request_id: &str) -> Result<(), StorageError> {
    let statuses: Vec<(String,)> =
        sqlx::query_as("SELECT status FROM upload_destinations WHERE request_id = ?")
            .bind(request_id)
            .fetch_all(pool)
            .await
            .map_err(|e| StorageError::Query { source: e })?;

    let overall = derive_overall(statuses.iter().map(|s| s.0.as_str()));

    sqlx::query("UPDATE upload_requests SET status = ?, updated_at = ? WHERE request_id = ?")
        .bind(overall)
        .bind(now_iso())
        .bind(request_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Why a resubmit request was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum ResubmitRefusal {
    /// No such destination under this request.
    NotFound,
    /// The destination is not in the terminal `failed` state.
    NotFailed {
        /// The destination's current status.
        current: String,
    },
}

/// Reset a failed destination to `queued` for another attempt.
///
/// Clears the error, appends a "Task resubmitted by user" log entry after
/// the existing entries, and recomputes the parent. The caller is
/// responsible for enqueueing the replacement job.
pub async fn resubmit(
    pool: &DbPool,
    request_id: &str,
    destination: &str,
) -> Result<Result<(), ResubmitRefusal>, StorageError> {
    let Some(child) = get_destination(pool, request_id, destination).await? else {
        return Ok(Err(ResubmitRefusal::NotFound));
    };

    // Conditional on the observed terminal state; a concurrent resubmit of
    // the same child loses here and reports the new status.
    let updated = sqlx::query(
        "UPDATE upload_destinations \
         SET status = 'queued', error = NULL, updated_at = ? \
         WHERE request_id = ? AND destination = ? AND status = 'failed'",
    )
    .bind(now_iso())
    .bind(request_id)
    .bind(destination)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    if updated.rows_affected() == 0 {
        return Ok(Err(ResubmitRefusal::NotFailed {
            current: child.status,
        }));
    }

    append_logs(
        pool,
        request_id,
        destination,
        &[LogEntry::now("INFO", "Task resubmitted by user")],
    )
    .await?;

    recompute_parent(pool, request_id).await?;

    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    async fn seed_request(pool: &DbPool, destinations: &[&str]) -> String {
        let request_id = uuid::Uuid::new_v4().to_string();
        let dests: Vec<String> = destinations.iter().map(ToString::to_string).collect();
        create_parent(
            pool,
            &request_id,
            "user-1",
            "https://videos.example/uploads/user-1/v.mp4",
            "hello",
            &dests,
        )
        .await
        .expect("create parent");
        request_id
    }

    #[test]
    fn derive_overall_priority_order() {
        assert_eq!(derive_overall(["processing", "failed"]), "processing");
        assert_eq!(derive_overall(["failed", "completed"]), "failed");
        assert_eq!(derive_overall(["completed", "completed"]), "completed");
        assert_eq!(derive_overall(["queued", "completed"]), "queued");
        assert_eq!(derive_overall(["queued"]), "queued");
        assert_eq!(derive_overall([]), "queued");
    }

    #[tokio::test]
    async fn create_parent_initializes_children_queued() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1", "instagram:I1"]).await;

        let parent = get(&pool, &request_id).await.expect("get").expect("exists");
        assert_eq!(parent.status, "queued");

        let children = get_destinations(&pool, &request_id).await.expect("children");
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.status == "queued"));
        assert!(children.iter().all(|c| c.error.is_none()));

        for child in &children {
            let logs = get_logs(&pool, &request_id, &child.destination)
                .await
                .expect("logs");
            assert!(logs.is_empty());
        }
    }

    #[tokio::test]
    async fn update_destination_does_not_touch_siblings() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1", "instagram:I1"]).await;

        update_destination(&pool, &request_id, "facebook:P1", "processing", None, None)
            .await
            .expect("update");

        let fb = get_destination(&pool, &request_id, "facebook:P1")
            .await
            .expect("get")
            .expect("exists");
        let ig = get_destination(&pool, &request_id, "instagram:I1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fb.status, "processing");
        assert_eq!(ig.status, "queued");
    }

    #[tokio::test]
    async fn recompute_parent_follows_derivation() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1", "instagram:I1"]).await;

        update_destination(&pool, &request_id, "facebook:P1", "processing", None, None)
            .await
            .expect("update");
        recompute_parent(&pool, &request_id).await.expect("recompute");
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "processing"
        );

        update_destination(
            &pool,
            &request_id,
            "facebook:P1",
            "failed",
            Some("publish rejected"),
            None,
        )
        .await
        .expect("update");
        recompute_parent(&pool, &request_id).await.expect("recompute");
        // The other child is still queued, not processing, so failed wins.
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "failed"
        );

        let result = serde_json::json!({"media_id": "m1", "status": "published"});
        update_destination(
            &pool,
            &request_id,
            "instagram:I1",
            "completed",
            None,
            Some(&result),
        )
        .await
        .expect("update");
        recompute_parent(&pool, &request_id).await.expect("recompute");
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "failed"
        );
    }

    #[tokio::test]
    async fn all_completed_parent_completes() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1", "instagram:I1"]).await;

        for dest in ["facebook:P1", "instagram:I1"] {
            let result = serde_json::json!({"post_id": "p"});
            update_destination(&pool, &request_id, dest, "completed", None, Some(&result))
                .await
                .expect("update");
        }
        recompute_parent(&pool, &request_id).await.expect("recompute");
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "completed"
        );
    }

    #[tokio::test]
    async fn logs_are_append_only_across_batches() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["twitter:T1"]).await;

        append_logs(
            &pool,
            &request_id,
            "twitter:T1",
            &[
                LogEntry::now("INFO", "first"),
                LogEntry::now("INFO", "second"),
            ],
        )
        .await
        .expect("append");

        append_logs(
            &pool,
            &request_id,
            "twitter:T1",
            &[LogEntry::now("ERROR", "third")],
        )
        .await
        .expect("append");

        let logs = get_logs(&pool, &request_id, "twitter:T1")
            .await
            .expect("logs");
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn resubmit_requires_failed_state() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["tiktok:T1"]).await;

        let refused = resubmit(&pool, &request_id, "tiktok:T1")
            .await
            .expect("resubmit")
            .unwrap_err();
        assert_eq!(
            refused,
            ResubmitRefusal::NotFailed {
                current: "queued".to_string()
            }
        );

        let refused = resubmit(&pool, &request_id, "tiktok:NOPE")
            .await
            .expect("resubmit")
            .unwrap_err();
        assert_eq!(refused, ResubmitRefusal::NotFound);
    }

    #[tokio::test]
    async fn resubmit_resets_child_and_keeps_old_logs() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["tiktok:T1"]).await;

        append_logs(
            &pool,
            &request_id,
            "tiktok:T1",
            &[LogEntry::now("ERROR", "upload initialization failed")],
        )
        .await
        .expect("append");
        update_destination(
            &pool,
            &request_id,
            "tiktok:T1",
            "failed",
            Some("init rejected"),
            None,
        )
        .await
        .expect("update");
        recompute_parent(&pool, &request_id).await.expect("recompute");

        resubmit(&pool, &request_id, "tiktok:T1")
            .await
            .expect("resubmit")
            .expect("accepted");

        let child = get_destination(&pool, &request_id, "tiktok:T1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(child.status, "queued");
        assert!(child.error.is_none());

        let logs = get_logs(&pool, &request_id, "tiktok:T1")
            .await
            .expect("logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "upload initialization failed");
        assert_eq!(logs[1].message, "Task resubmitted by user");

        // Parent no longer failed once the only child is queued again.
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "queued"
        );
    }

    #[tokio::test]
    async fn concurrent_sibling_updates_never_lose_writes() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1", "instagram:I1"]).await;

        let fb = serde_json::json!({"post_id": "fb"});
        let ig = serde_json::json!({"media_id": "ig"});
        let (a, b) = tokio::join!(
            update_destination(&pool, &request_id, "facebook:P1", "completed", None, Some(&fb)),
            update_destination(&pool, &request_id, "instagram:I1", "completed", None, Some(&ig)),
        );
        a.expect("facebook update");
        b.expect("instagram update");

        // Each child's slot holds its own write.
        let fb_child = get_destination(&pool, &request_id, "facebook:P1")
            .await
            .expect("get")
            .expect("exists");
        let ig_child = get_destination(&pool, &request_id, "instagram:I1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fb_child.result_json().expect("result")["post_id"], "fb");
        assert_eq!(ig_child.result_json().expect("result")["media_id"], "ig");

        // Racing recomputations converge on the same derived value.
        let (r1, r2) = tokio::join!(
            recompute_parent(&pool, &request_id),
            recompute_parent(&pool, &request_id),
        );
        r1.expect("recompute");
        r2.expect("recompute");
        assert_eq!(
            get(&pool, &request_id).await.unwrap().unwrap().status,
            "completed"
        );
    }

    #[tokio::test]
    async fn list_by_user_paginates_newest_first() {
        let pool = init_test_db().await.expect("init db");

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(seed_request(&pool, &["facebook:P1"]).await);
        }

        let page1 = list_by_user(&pool, "user-1", 2, None).await.expect("page 1");
        assert_eq!(page1.requests.len(), 2);
        let cursor = page1.next_cursor.clone().expect("cursor");

        let page2 = list_by_user(&pool, "user-1", 2, Some(&cursor))
            .await
            .expect("page 2");
        assert_eq!(page2.requests.len(), 2);

        let cursor2 = page2.next_cursor.clone().expect("cursor");
        let page3 = list_by_user(&pool, "user-1", 2, Some(&cursor2))
            .await
            .expect("page 3");
        assert_eq!(page3.requests.len(), 1);

        // Newest first, no overlap between pages.
        let mut seen: Vec<String> = Vec::new();
        for page in [&page1, &page2, &page3] {
            for r in &page.requests {
                assert!(!seen.contains(&r.request_id));
                seen.push(r.request_id.clone());
            }
        }
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn delete_parent_cascades() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["facebook:P1"]).await;
        append_logs(
            &pool,
            &request_id,
            "facebook:P1",
            &[LogEntry::now("INFO", "queued")],
        )
        .await
        .expect("append");

        delete_parent(&pool, &request_id).await.expect("delete");

        assert!(get(&pool, &request_id).await.expect("get").is_none());
        assert!(get_destinations(&pool, &request_id)
            .await
            .expect("children")
            .is_empty());
        assert!(get_logs(&pool, &request_id, "facebook:P1")
            .await
            .expect("logs")
            .is_empty());
    }

    #[tokio::test]
    async fn result_json_round_trips() {
        let pool = init_test_db().await.expect("init db");
        let request_id = seed_request(&pool, &["youtube:C1"]).await;

        let result = serde_json::json!({"video_id": "abc", "url": "https://www.youtube.com/shorts/abc"});
        update_destination(
            &pool,
            &request_id,
            "youtube:C1",
            "completed",
            None,
            Some(&result),
        )
        .await
        .expect("update");

        let child = get_destination(&pool, &request_id, "youtube:C1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(child.result_json().expect("json")["video_id"], "abc");
    }
}
