//! Twitter/X video publishing: chunked media upload on the v1.1 endpoint
//! plus tweet creation on v2, every request signed with OAuth 1.0a.
//!
//! Upload protocol: INIT declares the total size and `tweet_video`
//! category, APPEND pushes 5 MiB segments (parameters in the query string
//! so they participate in the signature, the bytes as a multipart part),
//! FINALIZE closes the session and may hand back `processing_info`, in
//! which case STATUS is polled at the server-suggested cadence.

use std::time::Duration;

use serde::Deserialize;

use super::oauth1::{authorization_header, Oauth1Credentials};
use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;
use crate::net;

/// Maximum video size accepted for buffering in memory.
const MAX_VIDEO_SIZE: u64 = 512 * 1024 * 1024;

/// APPEND segment size.
const CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Tweet text limit.
const MAX_TWEET_CHARS: usize = 280;

/// Timeout for the command calls (INIT/FINALIZE/STATUS) and tweet create.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for one APPEND segment.
const APPEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Total budget for the processing poll after FINALIZE.
const MAX_PROCESSING_WAIT: Duration = Duration::from_secs(300);

/// Fallback poll interval when the server suggests none.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Client for the Twitter media upload and tweet endpoints.
pub struct TwitterClient {
    client: reqwest::Client,
    upload_base_url: String,
    api_base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Deserialize)]
struct ProcessingInfo {
    state: String,
    #[serde(default)]
    check_after_secs: Option<u64>,
    #[serde(default)]
    error: Option<ProcessingError>,
}

#[derive(Debug, Deserialize)]
struct ProcessingError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    #[serde(default)]
    text: Option<String>,
}

/// Extract an error message from a v1.1 or v2 error body.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct V1Errors {
        errors: Vec<V1Error>,
    }
    #[derive(Deserialize)]
    struct V1Error {
        message: Option<String>,
    }
    #[derive(Deserialize)]
    struct V2Error {
        detail: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<V1Errors>(body) {
        if let Some(message) = parsed.errors.first().and_then(|e| e.message.clone()) {
            return message;
        }
    }
    if let Ok(parsed) = serde_json::from_str::<V2Error>(body) {
        if let Some(detail) = parsed.detail {
            return detail;
        }
    }
    body.to_string()
}

/// Truncate tweet text to the 280-character limit, eliding with `…`.
fn truncate_tweet_text(text: &str) -> String {
    if text.chars().count() <= MAX_TWEET_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_TWEET_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

impl TwitterClient {
    /// Create a client with the consumer credential pair.
    pub fn new(
        client: reqwest::Client,
        upload_base_url: String,
        api_base_url: String,
        consumer_key: String,
        consumer_secret: String,
    ) -> Self {
        Self {
            client,
            upload_base_url,
            api_base_url,
            consumer_key,
            consumer_secret,
        }
    }

    fn credentials(&self, access_token: &str, access_token_secret: &str) -> Oauth1Credentials {
        Oauth1Credentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            token: access_token.to_string(),
            token_secret: access_token_secret.to_string(),
        }
    }

    /// Post a tweet with an attached video.
    pub async fn post_video(
        &self,
        access_token: &str,
        access_token_secret: &str,
        video_url: &str,
        text: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        let credentials = self.credentials(access_token, access_token_secret);

        log.info(format!("Downloading video from {video_url}"));
        let video_data = net::download_to_memory(
            &self.client,
            video_url,
            MAX_VIDEO_SIZE,
            net::DOWNLOAD_TIMEOUT,
        )
        .await?;
        log.info(format!("Downloaded {} bytes", video_data.len()));

        let media_id = self.chunked_upload(&credentials, &video_data, log).await?;
        log.info(format!("Video uploaded: media_id={media_id}"));

        let tweet = self
            .create_tweet(&credentials, text, &media_id, log)
            .await?;

        Ok(PublishReceipt {
            platform: Platform::Twitter,
            post_id: tweet.id.clone(),
            payload: serde_json::json!({
                "tweet_id": tweet.id,
                "media_id": media_id,
                "platform": "twitter",
                "text": tweet.text,
            }),
        })
    }

    /// INIT + APPEND segments + FINALIZE (+ STATUS poll when processing).
    async fn chunked_upload(
        &self,
        credentials: &Oauth1Credentials,
        video_data: &[u8],
        log: &mut JobLog,
    ) -> Result<String, PublishError> {
        let upload_url = format!("{}/media/upload.json", self.upload_base_url);
        let total_bytes = video_data.len().to_string();

        // INIT
        let init_params = [
            ("command", "INIT"),
            ("total_bytes", total_bytes.as_str()),
            ("media_type", "video/mp4"),
            ("media_category", "tweet_video"),
        ];
        let auth = authorization_header("POST", &upload_url, &init_params, credentials);

        log.info(format!("INIT: {} bytes", video_data.len()));
        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", auth)
            .form(&init_params)
            .timeout(COMMAND_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !matches!(status, 200 | 201 | 202) {
            let message = api_error_message(&body);
            log.error(format!("INIT failed (HTTP {status}): {message}"));
            return Err(PublishError::Init { message });
        }

        let init: InitResponse = serde_json::from_str(&body).map_err(|e| PublishError::Init {
            message: format!("unexpected INIT response: {e}"),
        })?;
        let media_id = init.media_id_string;
        log.info(format!("Upload initialized: media_id={media_id}"));

        // APPEND segments
        let mut offset = 0usize;
        let mut segment_index = 0u32;
        while offset < video_data.len() {
            let end = (offset + CHUNK_SIZE).min(video_data.len());
            let chunk = video_data[offset..end].to_vec();
            let segment_str = segment_index.to_string();

            let append_params = [
                ("command", "APPEND"),
                ("media_id", media_id.as_str()),
                ("segment_index", segment_str.as_str()),
            ];
            // Parameters ride in the query string so the multipart body
            // stays outside the signature.
            let auth = authorization_header("POST", &upload_url, &append_params, credentials);
            let form = reqwest::multipart::Form::new()
                .part("media", reqwest::multipart::Part::bytes(chunk));

            log.info(format!(
                "APPEND segment {segment_index}: offset={offset}, size={}",
                end - offset
            ));
            let response = self
                .client
                .post(&upload_url)
                .query(&append_params)
                .header("Authorization", auth)
                .multipart(form)
                .timeout(APPEND_TIMEOUT)
                .send()
                .await
                .map_err(|e| PublishError::Network { source: e })?;

            let status = response.status().as_u16();
            if !matches!(status, 200 | 201 | 204) {
                let body = response.text().await.unwrap_or_default();
                let message = api_error_message(&body);
                log.error(format!("APPEND failed (HTTP {status}): {message}"));
                return Err(PublishError::Chunk {
                    offset: offset as u64,
                    message,
                });
            }

            offset = end;
            segment_index += 1;
        }
        log.info(format!("All segments uploaded: {segment_index}"));

        // FINALIZE
        let finalize_params = [("command", "FINALIZE"), ("media_id", media_id.as_str())];
        let auth = authorization_header("POST", &upload_url, &finalize_params, credentials);

        log.info("FINALIZE");
        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", auth)
            .form(&finalize_params)
            .timeout(COMMAND_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !matches!(status, 200 | 201) {
            let message = api_error_message(&body);
            log.error(format!("FINALIZE failed (HTTP {status}): {message}"));
            return Err(PublishError::Finalize { message });
        }

        let finalize: FinalizeResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Finalize {
                message: format!("unexpected FINALIZE response: {e}"),
            })?;

        if let Some(info) = finalize.processing_info {
            if matches!(info.state.as_str(), "pending" | "in_progress") {
                self.wait_for_processing(credentials, &media_id, log).await?;
            }
        }

        Ok(media_id)
    }

    /// Poll STATUS until processing succeeds, honoring `check_after_secs`.
    async fn wait_for_processing(
        &self,
        credentials: &Oauth1Credentials,
        media_id: &str,
        log: &mut JobLog,
    ) -> Result<(), PublishError> {
        let status_url = format!("{}/media/upload.json", self.upload_base_url);
        let status_params = [("command", "STATUS"), ("media_id", media_id)];

        let mut elapsed = Duration::ZERO;
        while elapsed < MAX_PROCESSING_WAIT {
            let auth = authorization_header("GET", &status_url, &status_params, credentials);
            let response = self
                .client
                .get(&status_url)
                .query(&status_params)
                .header("Authorization", auth)
                .timeout(COMMAND_TIMEOUT)
                .send()
                .await
                .map_err(|e| PublishError::Network { source: e })?;

            if response.status().is_success() {
                let data: StatusResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| PublishError::Processing {
                            message: format!("unexpected STATUS response: {e}"),
                        })?;

                let Some(info) = data.processing_info else {
                    // No processing info means the media is ready.
                    return Ok(());
                };

                log.info(format!("Processing state: {}", info.state));
                match info.state.as_str() {
                    "succeeded" => return Ok(()),
                    "failed" => {
                        let message = info
                            .error
                            .and_then(|e| e.message)
                            .unwrap_or_else(|| "processing failed".to_string());
                        log.error(format!("Video processing failed: {message}"));
                        return Err(PublishError::Processing { message });
                    }
                    _ => {
                        let wait = info
                            .check_after_secs
                            .map_or(DEFAULT_CHECK_INTERVAL, Duration::from_secs);
                        tokio::time::sleep(wait).await;
                        elapsed += wait.max(Duration::from_millis(1));
                    }
                }
            } else {
                tokio::time::sleep(DEFAULT_CHECK_INTERVAL).await;
                elapsed += DEFAULT_CHECK_INTERVAL;
            }
        }

        log.error(format!(
            "Video processing timed out after {}s",
            MAX_PROCESSING_WAIT.as_secs()
        ));
        Err(PublishError::Processing {
            message: format!(
                "processing timed out after {}s",
                MAX_PROCESSING_WAIT.as_secs()
            ),
        })
    }

    /// Create the tweet carrying the uploaded media.
    async fn create_tweet(
        &self,
        credentials: &Oauth1Credentials,
        text: &str,
        media_id: &str,
        log: &mut JobLog,
    ) -> Result<TweetData, PublishError> {
        let url = format!("{}/tweets", self.api_base_url);
        let text = truncate_tweet_text(text);

        let payload = serde_json::json!({
            "text": text,
            "media": { "media_ids": [media_id] },
        });

        // JSON bodies contribute no parameters to the signature.
        let auth = authorization_header("POST", &url, &[], credentials);

        log.info(format!(
            "Creating tweet: text_length={}, media_id={media_id}",
            text.chars().count()
        ));
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(&payload)
            .timeout(COMMAND_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !matches!(status, 200 | 201) {
            let message = api_error_message(&body);
            log.error(format!("Tweet creation failed (HTTP {status}): {message}"));
            return Err(PublishError::Publish { message });
        }

        let tweet: TweetResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Publish {
                message: format!("unexpected tweet response: {e}"),
            })?;

        log.info(format!("Tweet posted: tweet_id={}", tweet.data.id));
        Ok(tweet.data)
    }
}
