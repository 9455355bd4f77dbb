//! Configuration management for fanpost.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file
//! 3. Environment variable overrides (`FANPOST_` prefix for service
//!    settings; bare platform variables such as `TWITTER_API_SECRET` for
//!    credentials, so secrets can stay out of the file)
//!
//! CLI flag overrides are applied by the binary crate after loading.

mod env_overrides;
mod validation;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the publishing service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Data storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Work queue sizing.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Scheduled-post dispatcher pacing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Blob store (video upload bucket) settings.
    #[serde(default)]
    pub blob: BlobConfig,

    /// Per-platform app credentials and endpoint overrides.
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Port to listen on.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Origins allowed by the CORS layer. Empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Secret used to verify bearer identity tokens.
    #[serde(default)]
    pub identity_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            allowed_origins: Vec::new(),
            identity_secret: String::new(),
        }
    }
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

/// Data storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "fanpost.db".to_string()
}

/// Work queue sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Bounded channel capacity. A full queue fails the submit.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Number of concurrent worker tasks consuming the queue.
    #[serde(default = "default_queue_workers")]
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            workers: default_queue_workers(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_queue_workers() -> usize {
    4
}

/// Scheduled-post dispatcher pacing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Base interval between scheduler ticks, in seconds.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Maximum random jitter added to each tick, in seconds.
    #[serde(default = "default_jitter_seconds")]
    pub jitter_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            jitter_seconds: default_jitter_seconds(),
        }
    }
}

fn default_tick_seconds() -> u64 {
    60
}

fn default_jitter_seconds() -> u64 {
    5
}

/// Blob store (video upload bucket) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlobConfig {
    /// Bucket namespace reported to clients.
    #[serde(default)]
    pub bucket: String,

    /// Public base URL under which stored objects are readable.
    #[serde(default)]
    pub public_base_url: String,

    /// Secret used to sign time-limited upload URLs.
    #[serde(default)]
    pub signing_secret: String,

    /// Lifetime of issued upload URLs, in seconds.
    #[serde(default = "default_url_ttl_seconds")]
    pub url_ttl_seconds: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            public_base_url: String::new(),
            signing_secret: String::new(),
            url_ttl_seconds: default_url_ttl_seconds(),
        }
    }
}

fn default_url_ttl_seconds() -> u64 {
    600
}

/// Per-platform app credentials and endpoint overrides.
///
/// The `*_base_url` fields default to the real platform endpoints and are
/// only overridden by tests pointing at a local mock server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlatformsConfig {
    /// Facebook app credentials (shared with Instagram).
    #[serde(default)]
    pub facebook: FacebookConfig,

    /// Instagram endpoint overrides (credentials come from `facebook`).
    #[serde(default)]
    pub instagram: InstagramConfig,

    /// Twitter OAuth 1.0a consumer credentials.
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// YouTube (Google) OAuth client credentials.
    #[serde(default)]
    pub youtube: YouTubeConfig,

    /// LinkedIn OAuth client credentials.
    #[serde(default)]
    pub linkedin: LinkedInConfig,

    /// TikTok OAuth client credentials.
    #[serde(default)]
    pub tiktok: TikTokConfig,
}

/// Facebook app credentials (shared with Instagram).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacebookConfig {
    /// Facebook App ID.
    #[serde(default)]
    pub app_id: String,

    /// Facebook App Secret.
    #[serde(default)]
    pub app_secret: String,

    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            graph_base_url: default_graph_base_url(),
        }
    }
}

/// Instagram endpoint overrides (credentials come from the Facebook app).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstagramConfig {
    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

/// Twitter OAuth 1.0a consumer credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwitterConfig {
    /// API key (consumer key).
    #[serde(default)]
    pub api_key: String,

    /// API secret (consumer secret).
    #[serde(default)]
    pub api_secret: String,

    /// v1.1 media upload base URL.
    #[serde(default = "default_twitter_upload_base_url")]
    pub upload_base_url: String,

    /// v2 API base URL.
    #[serde(default = "default_twitter_api_base_url")]
    pub api_base_url: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            upload_base_url: default_twitter_upload_base_url(),
            api_base_url: default_twitter_api_base_url(),
        }
    }
}

fn default_twitter_upload_base_url() -> String {
    "https://upload.twitter.com/1.1".to_string()
}

fn default_twitter_api_base_url() -> String {
    "https://api.twitter.com/2".to_string()
}

/// YouTube (Google) OAuth client credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YouTubeConfig {
    /// OAuth client ID.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Resumable upload base URL.
    #[serde(default = "default_youtube_upload_base_url")]
    pub upload_base_url: String,

    /// Token refresh endpoint.
    #[serde(default = "default_youtube_token_url")]
    pub token_url: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            upload_base_url: default_youtube_upload_base_url(),
            token_url: default_youtube_token_url(),
        }
    }
}

fn default_youtube_upload_base_url() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}

fn default_youtube_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// LinkedIn OAuth client credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkedInConfig {
    /// OAuth client ID.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// REST API base URL.
    #[serde(default = "default_linkedin_api_base_url")]
    pub api_base_url: String,

    /// Token refresh endpoint.
    #[serde(default = "default_linkedin_token_url")]
    pub token_url: String,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base_url: default_linkedin_api_base_url(),
            token_url: default_linkedin_token_url(),
        }
    }
}

fn default_linkedin_api_base_url() -> String {
    "https://api.linkedin.com/v2".to_string()
}

fn default_linkedin_token_url() -> String {
    "https://www.linkedin.com/oauth/v2/accessToken".to_string()
}

/// TikTok OAuth client credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TikTokConfig {
    /// Client key (TikTok's name for the client ID).
    #[serde(default)]
    pub client_key: String,

    /// Client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Content Posting API base URL.
    #[serde(default = "default_tiktok_api_base_url")]
    pub api_base_url: String,

    /// Token refresh endpoint.
    #[serde(default = "default_tiktok_token_url")]
    pub token_url: String,
}

impl Default for TikTokConfig {
    fn default() -> Self {
        Self {
            client_key: String::new(),
            client_secret: String::new(),
            api_base_url: default_tiktok_api_base_url(),
            token_url: default_tiktok_token_url(),
        }
    }
}

fn default_tiktok_api_base_url() -> String {
    "https://open.tiktokapis.com/v2".to_string()
}

fn default_tiktok_token_url() -> String {
    "https://open.tiktokapis.com/v2/oauth/token/".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError { source: e })?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Build a configuration from defaults plus environment overrides only.
    ///
    /// Used when no config file is present; validation decides whether the
    /// result is usable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
