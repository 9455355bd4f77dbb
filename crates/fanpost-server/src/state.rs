//! Shared application state for the fanpost server.

use std::sync::Arc;

use fanpost_core::PostingContext;

/// Shared state accessible by all route handlers.
pub struct AppState {
    /// The process-wide posting context (pool, queue, adapters, blob store).
    pub ctx: Arc<PostingContext>,
    /// Secret used to verify bearer identity tokens.
    pub identity_secret: String,
}
