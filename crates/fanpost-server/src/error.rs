//! API error types for the fanpost server.
//!
//! Maps core domain errors to HTTP status codes and the stable
//! `{"detail": "..."}` JSON error shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fanpost_core::error::{IntakeError, StorageError};

/// API error type for route handlers.
pub enum ApiError {
    /// Invalid input (bad destination format, empty list, bad cursor).
    BadRequest(String),
    /// Missing or invalid bearer token.
    Unauthorized,
    /// Authenticated, but the resource belongs to another user.
    Forbidden,
    /// Unknown request, destination, or account.
    NotFound(String),
    /// Internal storage/database error.
    Storage(StorageError),
    /// Any other internal failure.
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::BadDestination { .. } | IntakeError::NoDestinations => {
                Self::BadRequest(err.to_string())
            }
            IntakeError::Enqueue { .. } => Self::Internal(err.to_string()),
            IntakeError::Storage(e) => Self::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Storage(e) => {
                tracing::error!("storage error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Self::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = axum::Json(json!({ "detail": detail }));
        (status, body).into_response()
    }
}
