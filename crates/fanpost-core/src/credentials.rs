//! Just-in-time credential refresh for connected accounts.
//!
//! `ensure_fresh` checks the stored expiry against the platform's
//! freshness window and either returns the stored token or runs the
//! platform's refresh protocol, persisting the new triple through the
//! account registry before returning. Two concurrent refreshes for one
//! account race harmlessly: both triples are valid and the registry write
//! is atomic, so the last one wins.

use std::time::Duration;

use serde::Deserialize;

use crate::config::{FacebookConfig, LinkedInConfig, PlatformsConfig, TikTokConfig, YouTubeConfig};
use crate::error::CredentialError;
use crate::platforms::Platform;
use crate::storage::accounts::{self, Account};
use crate::storage::DbPool;

/// Timeout for token refresh calls.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Seconds per day, for the Meta/LinkedIn early-refresh windows.
const DAY_SECS: i64 = 86_400;

/// Pre-expiry refresh window per platform, in seconds.
///
/// `None` means the platform's tokens are never refreshed.
fn refresh_window(platform: Platform) -> Option<i64> {
    match platform {
        // Long-lived Meta tokens are re-exchanged a week early.
        Platform::Facebook | Platform::Instagram => Some(7 * DAY_SECS),
        // Short Google tokens are refreshed once actually expired.
        Platform::YouTube => Some(0),
        // LinkedIn rotates a week early, like Meta.
        Platform::LinkedIn => Some(7 * DAY_SECS),
        // 24-hour TikTok tokens are refreshed minutes before expiry.
        Platform::TikTok => Some(300),
        // OAuth 1.0a secrets never expire.
        Platform::Twitter => None,
    }
}

/// Whether a token with the given expiry needs refreshing now.
fn needs_refresh(platform: Platform, token_expires_at: Option<i64>, now: i64) -> bool {
    let Some(window) = refresh_window(platform) else {
        return false;
    };
    match token_expires_at {
        Some(expires_at) => now >= expires_at - window,
        None => false,
    }
}

/// The outcome of one refresh protocol run.
#[derive(Debug)]
struct RefreshedTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Runs the per-platform refresh protocols and persists new triples.
pub struct CredentialManager {
    client: reqwest::Client,
    facebook: FacebookConfig,
    youtube: YouTubeConfig,
    linkedin: LinkedInConfig,
    tiktok: TikTokConfig,
}

impl CredentialManager {
    /// Create a manager from the platform credential configuration.
    pub fn new(client: reqwest::Client, platforms: &PlatformsConfig) -> Self {
        Self {
            client,
            facebook: platforms.facebook.clone(),
            youtube: platforms.youtube.clone(),
            linkedin: platforms.linkedin.clone(),
            tiktok: platforms.tiktok.clone(),
        }
    }

    /// Return a usable access token for the account, refreshing first when
    /// the stored one is inside the platform's refresh window.
    pub async fn ensure_fresh(
        &self,
        pool: &DbPool,
        platform: Platform,
        account: &Account,
    ) -> Result<String, CredentialError> {
        let now = chrono::Utc::now().timestamp();
        if !needs_refresh(platform, account.token_expires_at, now) {
            return Ok(account.access_token.clone());
        }

        tracing::info!(
            account_id = %account.account_id,
            platform = %platform,
            expires_at = ?account.token_expires_at,
            "Refreshing access token"
        );

        let refreshed = match platform {
            Platform::Facebook | Platform::Instagram => {
                self.refresh_meta(&account.access_token).await?
            }
            Platform::YouTube => {
                let refresh_token = account
                    .refresh_token
                    .as_deref()
                    .ok_or(CredentialError::NoRefreshToken)?;
                self.refresh_youtube(refresh_token).await?
            }
            Platform::LinkedIn => {
                let refresh_token = account
                    .refresh_token
                    .as_deref()
                    .ok_or(CredentialError::NoRefreshToken)?;
                self.refresh_linkedin(refresh_token).await?
            }
            Platform::TikTok => {
                let refresh_token = account
                    .refresh_token
                    .as_deref()
                    .ok_or(CredentialError::NoRefreshToken)?;
                self.refresh_tiktok(refresh_token).await?
            }
            Platform::Twitter => {
                return Err(CredentialError::NotRefreshable {
                    platform: platform.to_string(),
                });
            }
        };

        let new_expires_at = chrono::Utc::now().timestamp() + refreshed.expires_in;
        // Platforms that do not rotate the refresh token keep the stored one.
        let refresh_token = refreshed
            .refresh_token
            .as_deref()
            .or(account.refresh_token.as_deref());

        accounts::update_tokens(
            pool,
            &account.user_id,
            &account.account_id,
            &refreshed.access_token,
            refresh_token,
            Some(new_expires_at),
        )
        .await
        .map_err(|e| CredentialError::Storage { source: e })?;

        tracing::info!(
            account_id = %account.account_id,
            expires_at = new_expires_at,
            "Token refreshed successfully"
        );

        Ok(refreshed.access_token)
    }

    /// Meta long-lived token re-exchange: the current token buys a new one.
    async fn refresh_meta(&self, current_token: &str) -> Result<RefreshedTokens, CredentialError> {
        let url = format!("{}/oauth/access_token", self.facebook.graph_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.facebook.app_id.as_str()),
                ("client_secret", self.facebook.app_secret.as_str()),
                ("fb_exchange_token", current_token),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CredentialError::Network { source: e })?;

        let body = Self::check_response(response).await?;
        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: None,
            // Meta omits expires_in for already-long-lived tokens; assume 60 days.
            expires_in: body.expires_in.unwrap_or(60 * DAY_SECS),
        })
    }

    /// Google refresh: new access token, refresh token unchanged.
    async fn refresh_youtube(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedTokens, CredentialError> {
        let response = self
            .client
            .post(&self.youtube.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.youtube.client_id.as_str()),
                ("client_secret", self.youtube.client_secret.as_str()),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CredentialError::Network { source: e })?;

        let body = Self::check_response(response).await?;
        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: None,
            expires_in: body.expires_in.unwrap_or(3600),
        })
    }

    /// LinkedIn refresh: new access token plus a rotated refresh token.
    async fn refresh_linkedin(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedTokens, CredentialError> {
        let response = self
            .client
            .post(&self.linkedin.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.linkedin.client_id.as_str()),
                ("client_secret", self.linkedin.client_secret.as_str()),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CredentialError::Network { source: e })?;

        let body = Self::check_response(response).await?;
        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.unwrap_or(60 * DAY_SECS),
        })
    }

    /// TikTok refresh: new access token plus a rotated refresh token.
    async fn refresh_tiktok(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedTokens, CredentialError> {
        let response = self
            .client
            .post(&self.tiktok.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_key", self.tiktok.client_key.as_str()),
                ("client_secret", self.tiktok.client_secret.as_str()),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CredentialError::Network { source: e })?;

        let body = Self::check_response(response).await?;
        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.unwrap_or(DAY_SECS),
        })
    }

    async fn check_response(response: reqwest::Response) -> Result<TokenResponse, CredentialError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body_len = body.len(),
                "Token refresh failed (response body redacted)"
            );
            return Err(CredentialError::RefreshRejected {
                status: status.as_u16(),
                message: extract_oauth_error(&body),
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError::Network { source: e })
    }
}

/// Pull the OAuth error description out of a refresh failure body.
fn extract_oauth_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct OauthError {
        #[serde(default)]
        error_description: Option<String>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    }

    serde_json::from_str::<OauthError>(body)
        .ok()
        .and_then(|e| {
            e.error_description.or_else(|| match e.error {
                Some(serde_json::Value::String(s)) => Some(s),
                Some(serde_json::Value::Object(o)) => o
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(ToString::to_string),
                _ => None,
            })
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformsConfig;
    use crate::storage::accounts::NewAccount;
    use crate::storage::init_test_db;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn refresh_windows_match_platform_policy() {
        // Fresh for a month: only Meta/LinkedIn's 7-day window is a factor.
        let in_a_month = Some(now() + 30 * DAY_SECS);
        for platform in [
            Platform::Facebook,
            Platform::Instagram,
            Platform::YouTube,
            Platform::LinkedIn,
            Platform::TikTok,
        ] {
            assert!(!needs_refresh(platform, in_a_month, now()));
        }

        // Expiring tomorrow: inside the 7-day windows, outside the others.
        let tomorrow = Some(now() + DAY_SECS);
        assert!(needs_refresh(Platform::Facebook, tomorrow, now()));
        assert!(needs_refresh(Platform::Instagram, tomorrow, now()));
        assert!(needs_refresh(Platform::LinkedIn, tomorrow, now()));
        assert!(!needs_refresh(Platform::YouTube, tomorrow, now()));
        assert!(!needs_refresh(Platform::TikTok, tomorrow, now()));

        // Already expired: everyone refreshable needs it.
        let expired = Some(now() - 10);
        assert!(needs_refresh(Platform::YouTube, expired, now()));
        assert!(needs_refresh(Platform::TikTok, expired, now()));

        // Twitter never refreshes, and a NULL expiry never refreshes.
        assert!(!needs_refresh(Platform::Twitter, expired, now()));
        assert!(!needs_refresh(Platform::YouTube, None, now()));
    }

    async fn seed_account(
        pool: &crate::storage::DbPool,
        platform: &str,
        refresh_token: Option<&str>,
        token_expires_at: Option<i64>,
    ) -> Account {
        let account_id = accounts::create(
            pool,
            &NewAccount {
                user_id: "user-1".to_string(),
                platform: platform.to_string(),
                platform_user_id: "E1".to_string(),
                account_type: "user".to_string(),
                display_name: "acct".to_string(),
                username: None,
                access_token: "old-access".to_string(),
                refresh_token: refresh_token.map(ToString::to_string),
                token_expires_at,
            },
        )
        .await
        .expect("create account");

        accounts::get(pool, "user-1", &account_id)
            .await
            .expect("get")
            .expect("exists")
    }

    fn manager_with(server: &MockServer) -> CredentialManager {
        let mut platforms = PlatformsConfig::default();
        platforms.facebook.app_id = "fb-app".to_string();
        platforms.facebook.app_secret = "fb-secret".to_string();
        platforms.facebook.graph_base_url = server.uri();
        platforms.youtube.client_id = "yt-client".to_string();
        platforms.youtube.client_secret = "yt-secret".to_string();
        platforms.youtube.token_url = format!("{}/google/token", server.uri());
        platforms.linkedin.client_id = "li-client".to_string();
        platforms.linkedin.client_secret = "li-secret".to_string();
        platforms.linkedin.token_url = format!("{}/li/token", server.uri());
        platforms.tiktok.client_key = "tk-key".to_string();
        platforms.tiktok.client_secret = "tk-secret".to_string();
        platforms.tiktok.token_url = format!("{}/tk/token", server.uri());
        CredentialManager::new(reqwest::Client::new(), &platforms)
    }

    #[tokio::test]
    async fn fresh_token_returned_without_refresh() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;
        let manager = manager_with(&server);

        let account = seed_account(&pool, "youtube", Some("r"), Some(now() + 7200)).await;
        let token = manager
            .ensure_fresh(&pool, Platform::YouTube, &account)
            .await
            .expect("fresh");
        assert_eq!(token, "old-access");
    }

    #[tokio::test]
    async fn expired_youtube_token_refreshes_and_persists() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/google/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=yt-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "expires_in": 3600,
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_with(&server);
        let account = seed_account(&pool, "youtube", Some("yt-refresh"), Some(now() - 60)).await;

        let token = manager
            .ensure_fresh(&pool, Platform::YouTube, &account)
            .await
            .expect("refresh");
        assert_eq!(token, "new-access");

        let stored = accounts::get(&pool, "user-1", "youtube:E1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(stored.access_token, "new-access");
        // Google does not rotate the refresh token.
        assert_eq!(stored.refresh_token.as_deref(), Some("yt-refresh"));
        assert!(stored.token_expires_at.expect("expiry") > now());
    }

    #[tokio::test]
    async fn meta_re_exchange_uses_current_token() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("grant_type", "fb_exchange_token"))
            .and(query_param("fb_exchange_token", "old-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-long-lived",
                "token_type": "bearer",
                "expires_in": 5_184_000,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_with(&server);
        let account = seed_account(&pool, "facebook", None, Some(now() + DAY_SECS)).await;

        let token = manager
            .ensure_fresh(&pool, Platform::Facebook, &account)
            .await
            .expect("refresh");
        assert_eq!(token, "new-long-lived");
    }

    #[tokio::test]
    async fn tiktok_refresh_rotates_refresh_token() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tk/token"))
            .and(body_string_contains("client_key=tk-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tk-new",
                "refresh_token": "tk-rotated",
                "expires_in": 86_400,
            })))
            .mount(&server)
            .await;

        let manager = manager_with(&server);
        let account = seed_account(&pool, "tiktok", Some("tk-old"), Some(now() + 60)).await;

        let token = manager
            .ensure_fresh(&pool, Platform::TikTok, &account)
            .await
            .expect("refresh");
        assert_eq!(token, "tk-new");

        let stored = accounts::get(&pool, "user-1", "tiktok:E1")
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(stored.refresh_token.as_deref(), Some("tk-rotated"));
    }

    #[tokio::test]
    async fn missing_refresh_token_is_credential_error() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;
        let manager = manager_with(&server);

        let account = seed_account(&pool, "tiktok", None, Some(now() - 60)).await;
        let err = manager
            .ensure_fresh(&pool, Platform::TikTok, &account)
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::NoRefreshToken));
    }

    #[tokio::test]
    async fn rejected_refresh_surfaces_description() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/li/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The refresh token is revoked",
            })))
            .mount(&server)
            .await;

        let manager = manager_with(&server);
        let account = seed_account(&pool, "linkedin", Some("li-old"), Some(now() - 60)).await;

        let err = manager
            .ensure_fresh(&pool, Platform::LinkedIn, &account)
            .await
            .unwrap_err();
        match err {
            CredentialError::RefreshRejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "The refresh token is revoked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn twitter_token_passes_through_untouched() {
        let pool = init_test_db().await.expect("init db");
        let server = MockServer::start().await;
        let manager = manager_with(&server);

        // Twitter rows have no expiry; the token comes back as-is.
        let account = seed_account(&pool, "twitter", Some("token-secret"), None).await;
        let token = manager
            .ensure_fresh(&pool, Platform::Twitter, &account)
            .await
            .expect("pass through");
        assert_eq!(token, "old-access");
    }
}
