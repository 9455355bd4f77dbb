//! Facebook Page video publishing via the Graph API.
//!
//! The page `/videos` edge accepts a `file_url`, so Facebook fetches the
//! blob itself: one call, no local download.

use std::time::Duration;

use serde::Deserialize;

use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;

/// Timeout for Graph API JSON calls.
const GRAPH_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Facebook Graph API video edge.
pub struct FacebookClient {
    client: reqwest::Client,
    graph_base_url: String,
}

#[derive(Debug, Deserialize)]
struct PostVideoResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: Option<GraphErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: Option<String>,
}

/// Extract the Graph API error message from a response body, falling back
/// to the raw body.
pub(crate) fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<GraphErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

impl FacebookClient {
    /// Create a client against the given Graph API base URL.
    pub fn new(client: reqwest::Client, graph_base_url: String) -> Self {
        Self {
            client,
            graph_base_url,
        }
    }

    /// Publish a video to a Page. Returns the post id Facebook assigns.
    pub async fn post_video(
        &self,
        page_id: &str,
        page_access_token: &str,
        video_url: &str,
        caption: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        let url = format!("{}/{page_id}/videos", self.graph_base_url);

        let mut params = vec![
            ("access_token", page_access_token),
            ("file_url", video_url),
        ];
        if !caption.is_empty() {
            params.push(("description", caption));
        }

        log.info(format!("Posting video to Facebook page {page_id}"));
        let response = self
            .client
            .post(&url)
            .query(&params)
            .timeout(GRAPH_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        if !status.is_success() {
            let message = graph_error_message(&body);
            log.error(format!("Facebook video post failed: {message}"));
            return Err(PublishError::Publish { message });
        }

        let data: PostVideoResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Publish {
                message: format!("unexpected response from /videos: {e}"),
            })?;

        log.info(format!("Facebook video posted: {}", data.id));

        Ok(PublishReceipt {
            platform: Platform::Facebook,
            post_id: data.id.clone(),
            payload: serde_json::json!({
                "post_id": data.id,
                "video_id": data.id,
                "platform": "facebook",
                "page_id": page_id,
            }),
        })
    }
}
