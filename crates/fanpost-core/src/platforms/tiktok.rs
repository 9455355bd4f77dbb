//! TikTok video publishing via the Content Posting API.
//!
//! Single-chunk FILE_UPLOAD flow: init declares the exact byte count and
//! the post settings, the PUT carries the whole file with a
//! `Content-Range` header, then a status fetch confirms the publish. The
//! PUT is retried only on timeout, with the attempt timeout growing
//! 3/6/9 minutes; HTTP errors are terminal immediately.

use std::time::Duration;

use serde::Deserialize;

use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;
use crate::net;

/// Title limit for TikTok posts.
const MAX_TITLE_CHARS: usize = 150;

/// Practical cap for buffering the blob in memory.
const MAX_VIDEO_SIZE: u64 = 512 * 1024 * 1024;

/// TikTok blob downloads get a longer window than the default.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for JSON calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Base timeout for the first upload attempt; attempt N waits N times this.
const UPLOAD_TIMEOUT_BASE: Duration = Duration::from_secs(180);

/// Upload attempts before giving up on timeouts.
const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Per-attempt timeout ladder: 3, 6, then 9 minutes.
fn attempt_timeout(base: Duration, attempt: u32) -> Duration {
    base * (attempt + 1)
}

/// Backoff before retrying a timed-out attempt: 1 s, 2 s, 4 s.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt)
}

/// Post settings read from the request's `platform_settings`.
#[derive(Debug, Clone, Deserialize)]
pub struct TikTokSettings {
    /// Privacy level of the published post.
    #[serde(default = "default_privacy_level")]
    pub privacy_level: String,
    /// Disable duetting with the post.
    #[serde(default)]
    pub disable_duet: bool,
    /// Disable comments on the post.
    #[serde(default)]
    pub disable_comment: bool,
    /// Disable stitching the post.
    #[serde(default)]
    pub disable_stitch: bool,
    /// Cover frame timestamp in milliseconds.
    #[serde(default = "default_cover_timestamp_ms")]
    pub video_cover_timestamp_ms: u64,
}

impl Default for TikTokSettings {
    fn default() -> Self {
        Self {
            privacy_level: default_privacy_level(),
            disable_duet: false,
            disable_comment: false,
            disable_stitch: false,
            video_cover_timestamp_ms: default_cover_timestamp_ms(),
        }
    }
}

impl TikTokSettings {
    /// Parse settings from an opaque `platform_settings` document, falling
    /// back to the defaults for anything absent or malformed.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        value
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

fn default_privacy_level() -> String {
    "PUBLIC_TO_EVERYONE".to_string()
}

fn default_cover_timestamp_ms() -> u64 {
    1000
}

/// Client for the TikTok Content Posting API.
pub struct TikTokClient {
    client: reqwest::Client,
    api_base_url: String,
    upload_timeout_base: Duration,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(default)]
    data: Option<InitData>,
}

#[derive(Debug, Deserialize)]
struct InitData {
    #[serde(default)]
    publish_id: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
}

impl TikTokClient {
    /// Create a client against the given API base URL.
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
            upload_timeout_base: UPLOAD_TIMEOUT_BASE,
        }
    }

    #[cfg(test)]
    fn with_upload_timeout_base(mut self, base: Duration) -> Self {
        self.upload_timeout_base = base;
        self
    }

    /// Publish a video for the account that owns `access_token`.
    pub async fn post_video(
        &self,
        access_token: &str,
        video_url: &str,
        caption: &str,
        settings: &TikTokSettings,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        log.info(format!("Downloading video from {video_url}"));
        let video_data =
            net::download_to_memory(&self.client, video_url, MAX_VIDEO_SIZE, DOWNLOAD_TIMEOUT)
                .await?;
        log.info(format!("Downloaded {} bytes", video_data.len()));

        let (publish_id, upload_url) = self
            .init_upload(access_token, video_data.len() as u64, caption, settings, log)
            .await?;

        self.upload_video(&upload_url, video_data, log).await?;

        let status = self.fetch_status(access_token, &publish_id, log).await?;

        Ok(PublishReceipt {
            platform: Platform::TikTok,
            post_id: publish_id.clone(),
            payload: serde_json::json!({
                "publish_id": publish_id,
                "platform": "tiktok",
                "status": status,
            }),
        })
    }

    /// Declare the upload: size, single chunk, and the post settings.
    async fn init_upload(
        &self,
        access_token: &str,
        video_size: u64,
        caption: &str,
        settings: &TikTokSettings,
        log: &mut JobLog,
    ) -> Result<(String, String), PublishError> {
        let url = format!("{}/post/publish/video/init/", self.api_base_url);

        let title: String = if caption.is_empty() {
            "Video".to_string()
        } else {
            caption.chars().take(MAX_TITLE_CHARS).collect()
        };

        let payload = serde_json::json!({
            "post_info": {
                "title": title,
                "privacy_level": settings.privacy_level,
                "disable_duet": settings.disable_duet,
                "disable_comment": settings.disable_comment,
                "disable_stitch": settings.disable_stitch,
                "video_cover_timestamp_ms": settings.video_cover_timestamp_ms,
            },
            "source_info": {
                "source": "FILE_UPLOAD",
                "video_size": video_size,
                "chunk_size": video_size,
                "total_chunk_count": 1,
            },
        });

        log.info(format!("Initializing TikTok upload: {video_size} bytes"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("Content-Type", "application/json; charset=UTF-8")
            .json(&payload)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !status.is_success() {
            log.error(format!(
                "Upload init failed (HTTP {}): {body}",
                status.as_u16()
            ));
            return Err(PublishError::Init {
                message: format!("HTTP {}: {body}", status.as_u16()),
            });
        }

        let data: InitResponse = serde_json::from_str(&body).map_err(|e| PublishError::Init {
            message: format!("unexpected init response: {e}"),
        })?;

        let init = data.data.ok_or_else(|| PublishError::Init {
            message: format!("invalid init response: {body}"),
        })?;
        match (init.publish_id, init.upload_url) {
            (Some(publish_id), Some(upload_url)) => {
                log.info(format!("Publish ID: {publish_id}"));
                Ok((publish_id, upload_url))
            }
            _ => Err(PublishError::Init {
                message: format!("invalid init response: {body}"),
            }),
        }
    }

    /// PUT the whole file, retrying only on timeout.
    async fn upload_video(
        &self,
        upload_url: &str,
        video_data: Vec<u8>,
        log: &mut JobLog,
    ) -> Result<(), PublishError> {
        let video_size = video_data.len() as u64;
        let content_range = format!("bytes 0-{}/{}", video_size - 1, video_size);

        for attempt in 0..MAX_UPLOAD_ATTEMPTS {
            let timeout = attempt_timeout(self.upload_timeout_base, attempt);
            log.info(format!(
                "Upload attempt {}/{MAX_UPLOAD_ATTEMPTS}, timeout: {}s, size: {video_size} bytes",
                attempt + 1,
                timeout.as_secs()
            ));

            let result = self
                .client
                .put(upload_url)
                .header("Content-Type", "video/mp4")
                .header("Content-Range", &content_range)
                .body(video_data.clone())
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    log.info(format!("Video upload successful on attempt {}", attempt + 1));
                    return Ok(());
                }
                Ok(response) => {
                    // 4xx/5xx are terminal; retrying would repeat the outcome.
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    log.error(format!("Upload failed with HTTP {status}"));
                    return Err(PublishError::Chunk {
                        offset: 0,
                        message: format!("HTTP {status}: {body}"),
                    });
                }
                Err(e) if e.is_timeout() => {
                    if attempt + 1 < MAX_UPLOAD_ATTEMPTS {
                        let backoff = retry_backoff(attempt);
                        log.warn(format!(
                            "Upload timeout on attempt {}, retrying in {}s",
                            attempt + 1,
                            backoff.as_secs()
                        ));
                        tokio::time::sleep(backoff).await;
                    } else {
                        log.error(format!(
                            "Upload failed after {MAX_UPLOAD_ATTEMPTS} attempts"
                        ));
                        return Err(PublishError::Timeout {
                            attempts: MAX_UPLOAD_ATTEMPTS,
                        });
                    }
                }
                Err(e) => return Err(PublishError::Network { source: e }),
            }
        }

        Err(PublishError::Timeout {
            attempts: MAX_UPLOAD_ATTEMPTS,
        })
    }

    /// Confirm the publish via the status fetch endpoint.
    async fn fetch_status(
        &self,
        access_token: &str,
        publish_id: &str,
        log: &mut JobLog,
    ) -> Result<serde_json::Value, PublishError> {
        let url = format!("{}/post/publish/status/fetch/", self.api_base_url);

        log.info("Checking publish status");
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("Content-Type", "application/json; charset=UTF-8")
            .json(&serde_json::json!({ "publish_id": publish_id }))
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !status.is_success() {
            log.error(format!(
                "Status fetch failed (HTTP {}): {body}",
                status.as_u16()
            ));
            return Err(PublishError::Publish {
                message: format!("HTTP {}: {body}", status.as_u16()),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
        log.info(format!("TikTok video published: {publish_id}"));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn timeout_ladder_is_three_six_nine_minutes() {
        let base = UPLOAD_TIMEOUT_BASE;
        assert_eq!(attempt_timeout(base, 0), Duration::from_secs(180));
        assert_eq!(attempt_timeout(base, 1), Duration::from_secs(360));
        assert_eq!(attempt_timeout(base, 2), Duration::from_secs(540));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(1), Duration::from_secs(2));
    }

    #[test]
    fn settings_parse_with_defaults() {
        let settings = TikTokSettings::from_value(None);
        assert_eq!(settings.privacy_level, "PUBLIC_TO_EVERYONE");
        assert!(!settings.disable_duet);
        assert_eq!(settings.video_cover_timestamp_ms, 1000);

        let value = serde_json::json!({"privacy_level": "SELF_ONLY", "disable_comment": true});
        let settings = TikTokSettings::from_value(Some(&value));
        assert_eq!(settings.privacy_level, "SELF_ONLY");
        assert!(settings.disable_comment);
        assert!(!settings.disable_stitch);
    }

    async fn mount_video(server: &MockServer, bytes: usize) {
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4u8; bytes]))
            .mount(server)
            .await;
    }

    fn init_body(server: &MockServer) -> serde_json::Value {
        serde_json::json!({
            "data": {
                "publish_id": "PUB1",
                "upload_url": format!("{}/upload/PUB1", server.uri()),
            },
        })
    }

    #[tokio::test]
    async fn full_flow_publishes() {
        let server = MockServer::start().await;
        mount_video(&server, 1000).await;

        Mock::given(method("POST"))
            .and(path("/post/publish/video/init/"))
            .and(body_string_contains("FILE_UPLOAD"))
            .and(body_string_contains("\"total_chunk_count\":1"))
            .and(body_string_contains("\"video_size\":1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(init_body(&server)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/upload/PUB1"))
            .and(header("Content-Range", "bytes 0-999/1000"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/post/publish/status/fetch/"))
            .and(body_string_contains("PUB1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"status": "PUBLISH_COMPLETE"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TikTokClient::new(reqwest::Client::new(), server.uri());
        let mut log = JobLog::new("tiktok:T1");
        let receipt = client
            .post_video(
                "tk-token",
                &format!("{}/v.mp4", server.uri()),
                "my tiktok",
                &TikTokSettings::default(),
                &mut log,
            )
            .await
            .expect("publish");

        assert_eq!(receipt.post_id, "PUB1");
        assert_eq!(receipt.payload["publish_id"], "PUB1");
    }

    #[tokio::test]
    async fn http_error_on_upload_does_not_retry() {
        let server = MockServer::start().await;
        mount_video(&server, 100).await;

        Mock::given(method("POST"))
            .and(path("/post/publish/video/init/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(init_body(&server)))
            .mount(&server)
            .await;

        // Exactly one PUT: 4xx is terminal, no retry.
        Mock::given(method("PUT"))
            .and(path("/upload/PUB1"))
            .respond_with(ResponseTemplate::new(416))
            .expect(1)
            .mount(&server)
            .await;

        let client = TikTokClient::new(reqwest::Client::new(), server.uri());
        let mut log = JobLog::new("tiktok:T1");
        let err = client
            .post_video(
                "t",
                &format!("{}/v.mp4", server.uri()),
                "",
                &TikTokSettings::default(),
                &mut log,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Chunk { .. }));
    }

    #[tokio::test]
    async fn timeout_retries_and_exhausts() {
        let server = MockServer::start().await;
        mount_video(&server, 100).await;

        Mock::given(method("POST"))
            .and(path("/post/publish/video/init/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(init_body(&server)))
            .mount(&server)
            .await;

        // Every attempt takes longer than the (shrunk) attempt timeout.
        Mock::given(method("PUT"))
            .and(path("/upload/PUB1"))
            .respond_with(
                ResponseTemplate::new(201).set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = TikTokClient::new(reqwest::Client::new(), server.uri())
            .with_upload_timeout_base(Duration::from_millis(50));
        let mut log = JobLog::new("tiktok:T1");
        let err = client
            .post_video(
                "t",
                &format!("{}/v.mp4", server.uri()),
                "",
                &TikTokSettings::default(),
                &mut log,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout { attempts: 3 }));
    }

    #[tokio::test]
    async fn caption_truncated_to_150_chars() {
        let server = MockServer::start().await;
        mount_video(&server, 100).await;

        let expected: String = "c".repeat(150);
        Mock::given(method("POST"))
            .and(path("/post/publish/video/init/"))
            .and(body_string_contains(&format!("\"title\":\"{expected}\"")))
            .respond_with(ResponseTemplate::new(200).set_body_json(init_body(&server)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/PUB1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/post/publish/status/fetch/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = TikTokClient::new(reqwest::Client::new(), server.uri());
        let mut log = JobLog::new("tiktok:T1");
        client
            .post_video(
                "t",
                &format!("{}/v.mp4", server.uri()),
                &"c".repeat(300),
                &TikTokSettings::default(),
                &mut log,
            )
            .await
            .expect("publish");
    }
}
