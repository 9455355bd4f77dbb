//! YouTube Shorts publishing via the Data API v3 resumable upload.
//!
//! Two calls: a JSON init that returns the session URL in the `Location`
//! header, then a single PUT of the bytes. Videos under 60 seconds with a
//! vertical aspect ratio become Shorts on YouTube's side; the adapter
//! appends `#Shorts` to the description to help classification.

use std::time::Duration;

use serde::Deserialize;

use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;
use crate::net;

/// Title limit for Shorts.
const MAX_TITLE_CHARS: usize = 100;

/// Practical cap for buffering the blob in memory.
const MAX_VIDEO_SIZE: u64 = 512 * 1024 * 1024;

/// Timeout for the init call.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the video PUT.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the YouTube resumable upload endpoint.
pub struct YouTubeClient {
    client: reqwest::Client,
    upload_base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

/// Append `#Shorts` to the description unless it already carries the tag.
fn shorts_description(description: &str) -> String {
    if description.contains("#Shorts") || description.contains("#shorts") {
        return description.to_string();
    }
    format!("{description}\n\n#Shorts").trim().to_string()
}

impl YouTubeClient {
    /// Create a client against the given upload base URL.
    pub fn new(client: reqwest::Client, upload_base_url: String) -> Self {
        Self {
            client,
            upload_base_url,
        }
    }

    /// Upload a video as a Short.
    pub async fn post_video(
        &self,
        access_token: &str,
        video_url: &str,
        title: &str,
        description: &str,
        privacy_status: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        log.info(format!("Downloading video from {video_url}"));
        let video_data = net::download_to_memory(
            &self.client,
            video_url,
            MAX_VIDEO_SIZE,
            net::DOWNLOAD_TIMEOUT,
        )
        .await?;
        log.info(format!("Downloaded {} bytes", video_data.len()));

        let title: String = title.chars().take(MAX_TITLE_CHARS).collect();
        let metadata = serde_json::json!({
            "snippet": {
                "title": title,
                "description": shorts_description(description),
                "tags": ["Shorts"],
                "categoryId": "22",
            },
            "status": {
                "privacyStatus": privacy_status,
                "selfDeclaredMadeForKids": false,
            },
        });

        let upload_url = self.init_upload(access_token, &metadata, video_data.len(), log).await?;
        let video_id = self.upload_bytes(&upload_url, video_data, log).await?;

        log.info(format!("Video uploaded: video_id={video_id}"));
        Ok(PublishReceipt {
            platform: Platform::YouTube,
            post_id: video_id.clone(),
            payload: serde_json::json!({
                "video_id": video_id,
                "platform": "youtube",
                "title": title,
                "url": format!("https://www.youtube.com/shorts/{video_id}"),
            }),
        })
    }

    /// Initialize the resumable session; the upload URL arrives in the
    /// `Location` header.
    async fn init_upload(
        &self,
        access_token: &str,
        metadata: &serde_json::Value,
        content_length: usize,
        log: &mut JobLog,
    ) -> Result<String, PublishError> {
        let url = format!(
            "{}/videos?uploadType=resumable&part=snippet,status",
            self.upload_base_url
        );

        log.info(format!("Initializing resumable upload: {content_length} bytes"));
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("X-Upload-Content-Length", content_length.to_string())
            .header("X-Upload-Content-Type", "video/*")
            .json(metadata)
            .timeout(INIT_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            log.error(format!("Upload init failed: {message}"));
            return Err(PublishError::Init { message });
        }

        let upload_url = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| PublishError::Init {
                message: "no upload URL in Location header".to_string(),
            })?;

        log.info("Upload session initialized");
        Ok(upload_url)
    }

    /// PUT the bytes to the session URL; the response is the video resource.
    async fn upload_bytes(
        &self,
        upload_url: &str,
        video_data: Vec<u8>,
        log: &mut JobLog,
    ) -> Result<String, PublishError> {
        log.info(format!("Uploading video data: {} bytes", video_data.len()));
        let response = self
            .client
            .put(upload_url)
            .header("Content-Type", "video/*")
            .body(video_data)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;
        if !status.is_success() {
            let message = api_error_message(&body);
            log.error(format!("Video upload failed: {message}"));
            return Err(PublishError::Finalize { message });
        }

        let data: UploadResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Finalize {
                message: format!("no video ID in upload response: {e}"),
            })?;
        Ok(data.id)
    }
}
