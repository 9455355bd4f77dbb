//! Connected-account endpoints. Listing never includes credentials; the
//! registry's summary shape strips them before rows leave storage.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use fanpost_core::storage::accounts;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub platform: Option<String>,
}

/// List the caller's connected accounts (no secrets).
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = accounts::list(&state.ctx.pool, &user_id, query.platform.as_deref()).await?;
    Ok(Json(json!({ "accounts": rows })))
}

/// Disconnect an account.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = accounts::delete(&state.ctx.pool, &user_id, &account_id).await?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "account {account_id} not found"
        )));
    }
    Ok(Json(json!({ "message": "Account disconnected" })))
}
