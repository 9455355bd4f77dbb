//! fanpost HTTP API server.
//!
//! Exposes the posting pipeline over REST: blob upload-URL minting,
//! publish intake, the request-tree read surface, per-destination
//! resubmit, connected-account management, and scheduled posts. Every
//! route except `/health` requires a verified bearer identity token.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        // Blob store
        .route("/upload-url", post(routes::uploads::upload_url))
        // Publish intake
        .route("/post", post(routes::uploads::create_post))
        // Request tree reads
        .route("/uploads", get(routes::uploads::list_uploads))
        .route("/uploads/{id}", get(routes::uploads::get_upload))
        .route("/uploads/{id}/logs", get(routes::uploads::get_logs))
        .route("/uploads/{id}/resubmit", post(routes::uploads::resubmit))
        // Accounts
        .route("/accounts", get(routes::accounts::list_accounts))
        .route("/accounts/{id}", delete(routes::accounts::delete_account))
        // Scheduled posts
        .route(
            "/scheduled",
            get(routes::scheduled::list_scheduled).post(routes::scheduled::create_scheduled),
        )
        .route(
            "/scheduled/{id}",
            delete(routes::scheduled::cancel_scheduled),
        );

    Router::new()
        .nest("/api/social", api)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS from configuration; an empty origin list falls back to permissive
/// (same-host deployments behind a proxy).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
