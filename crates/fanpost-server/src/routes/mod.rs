//! Route handlers for the `/api/social` surface.

pub mod accounts;
pub mod health;
pub mod scheduled;
pub mod uploads;
