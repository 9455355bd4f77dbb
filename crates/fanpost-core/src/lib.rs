//! Core library for fanpost, a multi-destination social-video publishing
//! pipeline.
//!
//! A user uploads a video once and publishes it to any selection of their
//! connected accounts across six platforms. Intake fans the request out
//! into independent per-destination jobs on a bounded work queue; workers
//! run each platform's multi-step upload protocol, refreshing credentials
//! just in time, and aggregate per-destination status and logs back onto
//! the parent request. A scheduler promotes due scheduled posts into the
//! same intake exactly once.

pub mod blob;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod intake;
pub mod net;
pub mod platforms;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod worker;

pub use config::Config;
pub use context::PostingContext;
