//! Configuration validation logic.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.server.identity_secret.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "server.identity_secret".to_string(),
            });
        }

        if self.blob.public_base_url.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "blob.public_base_url".to_string(),
            });
        } else if !self.blob.public_base_url.starts_with("http") {
            errors.push(ConfigError::InvalidValue {
                field: "blob.public_base_url".to_string(),
                message: "must be an http(s) URL".to_string(),
            });
        }

        if self.blob.signing_secret.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "blob.signing_secret".to_string(),
            });
        }

        if self.queue.capacity == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "queue.capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.queue.workers == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "queue.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.scheduler.tick_seconds == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.tick_seconds".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
