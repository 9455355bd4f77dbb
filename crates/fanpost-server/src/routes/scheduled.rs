//! Scheduled-post endpoints: create, list, cancel. The scheduler loop in
//! the core promotes due rows into live upload requests.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use fanpost_core::platforms::parse_destination;
use fanpost_core::storage::scheduled;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateScheduledRequest {
    pub s3_key: String,
    #[serde(default)]
    pub caption: String,
    pub account_ids: Vec<String>,
    /// When to post, epoch seconds. Must be in the future.
    pub scheduled_time: i64,
    #[serde(default)]
    pub platform_settings: Option<Value>,
}

/// Create a scheduled post.
pub async fn create_scheduled(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateScheduledRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.account_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "account_ids must not be empty".to_string(),
        ));
    }
    for destination in &body.account_ids {
        if parse_destination(destination).is_none() {
            return Err(ApiError::BadRequest(format!(
                "invalid destination format: {destination}"
            )));
        }
    }
    if body.scheduled_time <= chrono::Utc::now().timestamp() {
        return Err(ApiError::BadRequest(
            "scheduled_time must be in the future".to_string(),
        ));
    }

    let scheduled_post_id = uuid::Uuid::new_v4().to_string();
    let video_url = state.ctx.blob.public_url(&body.s3_key);

    scheduled::create(
        &state.ctx.pool,
        &user_id,
        &scheduled_post_id,
        &video_url,
        &body.caption,
        &body.account_ids,
        body.platform_settings.as_ref(),
        body.scheduled_time,
    )
    .await?;

    Ok(Json(json!({
        "scheduled_post_id": scheduled_post_id,
        "status": "scheduled",
        "scheduled_time": body.scheduled_time,
        "destinations": body.account_ids,
        "video_url": video_url,
    })))
}

#[derive(Deserialize)]
pub struct ListScheduledQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// List the caller's scheduled posts.
pub async fn list_scheduled(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListScheduledQuery>,
) -> Result<Json<Value>, ApiError> {
    let posts = scheduled::list_by_user(&state.ctx.pool, &user_id, query.limit).await?;
    Ok(Json(json!({ "posts": posts })))
}

/// Cancel a scheduled post that has not been promoted yet.
pub async fn cancel_scheduled(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(scheduled_post_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(post) = scheduled::get(&state.ctx.pool, &user_id, &scheduled_post_id).await? else {
        return Err(ApiError::NotFound(format!(
            "scheduled post {scheduled_post_id} not found"
        )));
    };

    let cancelled = scheduled::cancel(&state.ctx.pool, &user_id, &scheduled_post_id).await?;
    if !cancelled {
        return Err(ApiError::BadRequest(format!(
            "only scheduled posts can be cancelled (status is {})",
            post.status
        )));
    }

    Ok(Json(json!({
        "scheduled_post_id": scheduled_post_id,
        "status": "cancelled",
    })))
}
