//! Platform adapters for the six publishing targets.
//!
//! Each adapter owns its platform's multi-step publish protocol and nothing
//! else: adapters never touch the request store, they only return a
//! [`PublishReceipt`] or raise a [`PublishError`](crate::error::PublishError)
//! for the worker to record. Every HTTP step emits an entry through the
//! [`JobLog`] the worker passes in.

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod oauth1;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

use std::fmt;
use std::str::FromStr;

use crate::storage::requests::LogEntry;

/// The closed set of supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    YouTube,
    LinkedIn,
    TikTok,
}

impl Platform {
    /// The lowercase wire tag used in destination identifiers and rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::YouTube => "youtube",
            Platform::LinkedIn => "linkedin",
            Platform::TikTok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "twitter" => Ok(Platform::Twitter),
            "youtube" => Ok(Platform::YouTube),
            "linkedin" => Ok(Platform::LinkedIn),
            "tiktok" => Ok(Platform::TikTok),
            _ => Err(()),
        }
    }
}

/// Parse a destination identifier `"<platform>:<entity_id>"`.
///
/// Returns `None` when the platform tag is unknown or the entity id is
/// empty.
pub fn parse_destination(destination: &str) -> Option<(Platform, &str)> {
    let (tag, entity_id) = destination.split_once(':')?;
    if entity_id.is_empty() {
        return None;
    }
    let platform = tag.parse().ok()?;
    Some((platform, entity_id))
}

/// The terminal result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// The platform that accepted the post.
    pub platform: Platform,
    /// The platform's primary identifier for the post (tweet id, media id,
    /// video id, publish id, or post URN).
    pub post_id: String,
    /// Full platform-specific payload stored on the destination's `result`.
    pub payload: serde_json::Value,
}

/// Structured per-destination log buffer.
///
/// Collects the entries that are written back onto the destination row and
/// mirrors each one to `tracing` so operators see the same stream live.
#[derive(Debug)]
pub struct JobLog {
    destination: String,
    entries: Vec<LogEntry>,
}

impl JobLog {
    /// Create a log buffer scoped to one destination.
    pub fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            entries: Vec::new(),
        }
    }

    /// Append an INFO entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push("INFO", message.into());
    }

    /// Append a WARNING entry.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push("WARNING", message.into());
    }

    /// Append an ERROR entry.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push("ERROR", message.into());
    }

    fn push(&mut self, level: &str, message: String) {
        match level {
            "ERROR" => tracing::error!(destination = %self.destination, "{message}"),
            "WARNING" => tracing::warn!(destination = %self.destination, "{message}"),
            _ => tracing::info!(destination = %self.destination, "{message}"),
        }
        self.entries.push(LogEntry::now(level, message));
    }

    /// The buffered entries, in append order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the buffer for a partial flush to the store.
    pub fn take_entries(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_destination_accepts_all_platforms() {
        for tag in [
            "facebook", "instagram", "twitter", "youtube", "linkedin", "tiktok",
        ] {
            let dest = format!("{tag}:entity-1");
            let (platform, entity) = parse_destination(&dest).expect("parse");
            assert_eq!(platform.as_str(), tag);
            assert_eq!(entity, "entity-1");
        }
    }

    #[test]
    fn parse_destination_rejects_unknown_platform() {
        assert!(parse_destination("myspace:123").is_none());
    }

    #[test]
    fn parse_destination_rejects_missing_separator_or_entity() {
        assert!(parse_destination("facebook").is_none());
        assert!(parse_destination("facebook:").is_none());
    }

    #[test]
    fn parse_destination_keeps_colons_in_entity_id() {
        let (platform, entity) = parse_destination("linkedin:urn:li:person:AB").expect("parse");
        assert_eq!(platform, Platform::LinkedIn);
        assert_eq!(entity, "urn:li:person:AB");
    }

    #[test]
    fn platform_round_trips_through_str() {
        for platform in [
            Platform::Facebook,
            Platform::Instagram,
            Platform::Twitter,
            Platform::YouTube,
            Platform::LinkedIn,
            Platform::TikTok,
        ] {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
    }

    #[test]
    fn job_log_buffers_in_order() {
        let mut log = JobLog::new("facebook:P1");
        log.info("first");
        log.warn("second");
        log.error("third");

        let levels: Vec<&str> = log.entries().iter().map(|e| e.level.as_str()).collect();
        assert_eq!(levels, vec!["INFO", "WARNING", "ERROR"]);

        let drained = log.take_entries();
        assert_eq!(drained.len(), 3);
        assert!(log.is_empty());
    }
}
