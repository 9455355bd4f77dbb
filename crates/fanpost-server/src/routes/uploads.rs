//! Upload request endpoints: blob upload-URL minting, publish intake, and
//! the read surface over the request tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use fanpost_core::intake;
use fanpost_core::queue::JobMessage;
use fanpost_core::storage::requests::{self, ResubmitRefusal, UploadRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UploadUrlRequest {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Mint a signed, time-limited upload URL for a video file.
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<UploadUrlRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename must not be empty".to_string()));
    }

    let issued = state.ctx.blob.issue_upload_url(&user_id, &body.filename);
    Ok(Json(json!({
        "upload_url": issued.upload_url,
        "s3_key": issued.s3_key,
        "bucket": issued.bucket,
    })))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub s3_key: String,
    #[serde(default)]
    pub caption: String,
    pub account_ids: Vec<String>,
    #[serde(default)]
    pub platform_settings: Option<Value>,
}

/// Accept a publish request and fan it out to the posting queue.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreatePostRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.account_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "account_ids must not be empty".to_string(),
        ));
    }

    let video_url = state.ctx.blob.public_url(&body.s3_key);
    let accepted = intake::submit(
        &state.ctx,
        &user_id,
        &video_url,
        &body.caption,
        &body.account_ids,
        body.platform_settings,
    )
    .await?;

    Ok(Json(json!({
        "request_id": accepted.request_id,
        "status": accepted.status,
        "destinations": accepted.destinations,
        "video_url": accepted.video_url,
        "created_at": accepted.created_at,
    })))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub last_key: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// List the caller's requests, newest first, with cursor pagination.
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = requests::list_by_user(
        &state.ctx.pool,
        &user_id,
        query.limit,
        query.last_key.as_deref(),
    )
    .await?;

    let mut summaries = Vec::with_capacity(page.requests.len());
    for request in &page.requests {
        summaries.push(summarize(&state, request).await?);
    }

    let mut body = json!({ "requests": summaries });
    if let Some(cursor) = page.next_cursor {
        body["last_evaluated_key"] = json!(cursor);
    }
    Ok(Json(body))
}

/// Parent summary with a destination → status map.
async fn summarize(state: &Arc<AppState>, request: &UploadRequest) -> Result<Value, ApiError> {
    let children = requests::get_destinations(&state.ctx.pool, &request.request_id).await?;
    let statuses: BTreeMap<String, String> = children
        .into_iter()
        .map(|c| (c.destination, c.status))
        .collect();

    Ok(json!({
        "request_id": request.request_id,
        "status": request.status,
        "caption": request.caption,
        "video_url": request.video_url,
        "destinations": statuses,
        "created_at": request.created_at,
        "updated_at": request.updated_at,
    }))
}

/// Load a parent row, enforcing ownership.
async fn load_owned(
    state: &Arc<AppState>,
    user_id: &str,
    request_id: &str,
) -> Result<UploadRequest, ApiError> {
    let request = requests::get(&state.ctx.pool, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("upload request {request_id} not found")))?;
    if request.user_id != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(request)
}

/// Full detail: parent plus every destination with its logs.
pub async fn get_upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let request = load_owned(&state, &user_id, &request_id).await?;
    let children = requests::get_destinations(&state.ctx.pool, &request_id).await?;

    let mut destinations = BTreeMap::new();
    for child in children {
        let logs = requests::get_logs(&state.ctx.pool, &request_id, &child.destination).await?;
        destinations.insert(
            child.destination.clone(),
            json!({
                "status": child.status,
                "error": child.error,
                "result": child.result_json(),
                "logs": logs,
                "created_at": child.created_at,
                "updated_at": child.updated_at,
            }),
        );
    }

    Ok(Json(json!({
        "request_id": request.request_id,
        "status": request.status,
        "caption": request.caption,
        "video_url": request.video_url,
        "destinations": destinations,
        "created_at": request.created_at,
        "updated_at": request.updated_at,
    })))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub destination: Option<String>,
}

/// Logs view, filterable to a single destination.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(request_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, ApiError> {
    let request = load_owned(&state, &user_id, &request_id).await?;

    if let Some(destination) = query.destination {
        let child = requests::get_destination(&state.ctx.pool, &request_id, &destination)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("destination {destination} not found"))
            })?;
        let logs = requests::get_logs(&state.ctx.pool, &request_id, &destination).await?;
        return Ok(Json(json!({
            "request_id": request_id,
            "destination": destination,
            "status": child.status,
            "logs": logs,
            "error": child.error,
            "result": child.result_json(),
            "created_at": child.created_at,
            "updated_at": child.updated_at,
        })));
    }

    let children = requests::get_destinations(&state.ctx.pool, &request_id).await?;
    let mut destinations = BTreeMap::new();
    for child in children {
        let logs = requests::get_logs(&state.ctx.pool, &request_id, &child.destination).await?;
        destinations.insert(
            child.destination.clone(),
            json!({
                "status": child.status,
                "logs": logs,
                "error": child.error,
                "result": child.result_json(),
            }),
        );
    }

    Ok(Json(json!({
        "request_id": request_id,
        "overall_status": request.status,
        "destinations": destinations,
        "video_url": request.video_url,
        "caption": request.caption,
        "created_at": request.created_at,
    })))
}

#[derive(Deserialize)]
pub struct ResubmitRequest {
    pub destination: String,
}

/// Reset a failed destination to `queued` and enqueue a replacement job.
pub async fn resubmit(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(request_id): Path<String>,
    Json(body): Json<ResubmitRequest>,
) -> Result<Json<Value>, ApiError> {
    let request = load_owned(&state, &user_id, &request_id).await?;

    match requests::resubmit(&state.ctx.pool, &request_id, &body.destination).await? {
        Ok(()) => {}
        Err(ResubmitRefusal::NotFound) => {
            return Err(ApiError::NotFound(format!(
                "destination {} not found",
                body.destination
            )));
        }
        Err(ResubmitRefusal::NotFailed { current }) => {
            return Err(ApiError::BadRequest(format!(
                "only failed tasks can be resubmitted (destination is {current})"
            )));
        }
    }

    let job = JobMessage {
        request_id: request_id.clone(),
        user_id,
        destination: body.destination.clone(),
        video_url: request.video_url,
        caption: request.caption,
        platform_settings: None,
    };
    state
        .ctx
        .jobs
        .enqueue(job)
        .map_err(ApiError::Internal)?;

    Ok(Json(json!({
        "message": "Task resubmitted successfully",
        "request_id": request_id,
        "destination": body.destination,
    })))
}
