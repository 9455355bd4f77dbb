//! Process-wide context carrying every external-service handle.
//!
//! Built once at startup and shared as `Arc`; everything inside is
//! immutable after construction (the HTTP client and DB pool are
//! internally synchronized), so the context is safe to hand to any number
//! of concurrent tasks.

use crate::blob::BlobStore;
use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::platforms::facebook::FacebookClient;
use crate::platforms::instagram::InstagramClient;
use crate::platforms::linkedin::LinkedInClient;
use crate::platforms::tiktok::TikTokClient;
use crate::platforms::twitter::TwitterClient;
use crate::platforms::youtube::YouTubeClient;
use crate::queue::JobSender;
use crate::storage::DbPool;

/// Shared handles for intake, workers, the scheduler, and the API server.
pub struct PostingContext {
    /// SQLite connection pool.
    pub pool: DbPool,
    /// Shared HTTP client (connection pooling across all adapters).
    pub http: reqwest::Client,
    /// Sending half of the posting queue.
    pub jobs: JobSender,
    /// Upload-URL signer / public-URL resolver.
    pub blob: BlobStore,
    /// Token refresh protocols.
    pub credentials: CredentialManager,
    /// Facebook Page video adapter.
    pub facebook: FacebookClient,
    /// Instagram Reels adapter.
    pub instagram: InstagramClient,
    /// Twitter/X chunked-upload adapter.
    pub twitter: TwitterClient,
    /// YouTube Shorts adapter.
    pub youtube: YouTubeClient,
    /// LinkedIn video adapter.
    pub linkedin: LinkedInClient,
    /// TikTok direct-post adapter.
    pub tiktok: TikTokClient,
}

impl PostingContext {
    /// Build the context from configuration. One HTTP client is shared by
    /// every adapter and the credential manager.
    pub fn new(pool: DbPool, config: &Config, jobs: JobSender) -> Self {
        let http = reqwest::Client::new();
        let platforms = &config.platforms;

        Self {
            pool,
            http: http.clone(),
            jobs,
            blob: BlobStore::new(&config.blob),
            credentials: CredentialManager::new(http.clone(), platforms),
            facebook: FacebookClient::new(http.clone(), platforms.facebook.graph_base_url.clone()),
            instagram: InstagramClient::new(
                http.clone(),
                platforms.instagram.graph_base_url.clone(),
            ),
            twitter: TwitterClient::new(
                http.clone(),
                platforms.twitter.upload_base_url.clone(),
                platforms.twitter.api_base_url.clone(),
                platforms.twitter.api_key.clone(),
                platforms.twitter.api_secret.clone(),
            ),
            youtube: YouTubeClient::new(http.clone(), platforms.youtube.upload_base_url.clone()),
            linkedin: LinkedInClient::new(http.clone(), platforms.linkedin.api_base_url.clone()),
            tiktok: TikTokClient::new(http, platforms.tiktok.api_base_url.clone()),
        }
    }
}
