//! Environment variable overrides for configuration.

use std::env;

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Service settings use the `FANPOST_` prefix; platform secrets use
    /// their conventional bare names so deployments can inject them from a
    /// secret store without touching the config file.
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(val) = env::var("FANPOST_BIND_HOST") {
            self.server.bind_host = val;
        }
        if let Ok(val) = env::var("FANPOST_BIND_PORT") {
            self.server.bind_port = parse_env_u16("FANPOST_BIND_PORT", &val)?;
        }
        if let Ok(val) = env::var("FANPOST_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_csv(&val);
        }
        if let Ok(val) = env::var("FANPOST_IDENTITY_SECRET") {
            self.server.identity_secret = val;
        }

        // Storage
        if let Ok(val) = env::var("FANPOST_DB_PATH") {
            self.storage.db_path = val;
        }

        // Blob store
        if let Ok(val) = env::var("FANPOST_VIDEO_BUCKET") {
            self.blob.bucket = val;
        }
        if let Ok(val) = env::var("FANPOST_BLOB_BASE_URL") {
            self.blob.public_base_url = val;
        }
        if let Ok(val) = env::var("FANPOST_BLOB_SIGNING_SECRET") {
            self.blob.signing_secret = val;
        }

        // Platform credentials
        if let Ok(val) = env::var("FACEBOOK_APP_ID") {
            self.platforms.facebook.app_id = val;
        }
        if let Ok(val) = env::var("FACEBOOK_APP_SECRET") {
            self.platforms.facebook.app_secret = val;
        }
        if let Ok(val) = env::var("TWITTER_API_KEY") {
            self.platforms.twitter.api_key = val;
        }
        if let Ok(val) = env::var("TWITTER_API_SECRET") {
            self.platforms.twitter.api_secret = val;
        }
        if let Ok(val) = env::var("YOUTUBE_CLIENT_ID") {
            self.platforms.youtube.client_id = val;
        }
        if let Ok(val) = env::var("YOUTUBE_CLIENT_SECRET") {
            self.platforms.youtube.client_secret = val;
        }
        if let Ok(val) = env::var("LINKEDIN_CLIENT_ID") {
            self.platforms.linkedin.client_id = val;
        }
        if let Ok(val) = env::var("LINKEDIN_CLIENT_SECRET") {
            self.platforms.linkedin.client_secret = val;
        }
        if let Ok(val) = env::var("TIKTOK_CLIENT_KEY") {
            self.platforms.tiktok.client_key = val;
        }
        if let Ok(val) = env::var("TIKTOK_CLIENT_SECRET") {
            self.platforms.tiktok.client_secret = val;
        }

        Ok(())
    }
}

/// Parse a u16 from an environment variable value with a descriptive error.
fn parse_env_u16(name: &str, val: &str) -> Result<u16, ConfigError> {
    val.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        field: name.to_string(),
        message: format!("'{val}' is not a valid port number"),
    })
}

/// Split a comma-separated environment value into trimmed entries.
fn split_csv(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
