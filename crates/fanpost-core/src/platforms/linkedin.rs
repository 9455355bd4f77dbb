//! LinkedIn video publishing via the assets + ugcPosts APIs.
//!
//! Four phases: register an upload (returns an asset URN and an upload
//! URL), PUT the bytes, poll the asset until LinkedIn finishes processing,
//! then create the UGC post referencing the asset.

use std::time::Duration;

use serde::Deserialize;

use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;
use crate::net;

/// Practical cap for buffering the blob in memory.
const MAX_VIDEO_SIZE: u64 = 512 * 1024 * 1024;

/// Timeout for JSON calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the video PUT.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Total budget for the asset processing poll.
const MAX_PROCESSING_WAIT: Duration = Duration::from_secs(120);

/// Default pause between asset polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The Rest.li protocol header LinkedIn requires on every call.
const RESTLI_HEADER: (&str, &str) = ("X-Restli-Protocol-Version", "2.0.0");

/// Client for the LinkedIn REST API.
pub struct LinkedInClient {
    client: reqwest::Client,
    api_base_url: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AssetStatusResponse {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UgcPostResponse {
    id: String,
}

impl LinkedInClient {
    /// Create a client against the given API base URL.
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Publish a video post for a member.
    pub async fn post_video(
        &self,
        person_urn: &str,
        access_token: &str,
        video_url: &str,
        caption: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        log.info(format!("Registering video upload for {person_urn}"));
        let (asset_urn, upload_url) = self.register_upload(person_urn, access_token).await?;
        log.info(format!("Upload registered: asset={asset_urn}"));

        log.info(format!("Downloading video from {video_url}"));
        let video_data = net::download_to_memory(
            &self.client,
            video_url,
            MAX_VIDEO_SIZE,
            net::DOWNLOAD_TIMEOUT,
        )
        .await?;
        log.info(format!("Downloaded {} bytes", video_data.len()));

        self.upload_bytes(&upload_url, access_token, video_data, log)
            .await?;

        self.wait_for_processing(&asset_urn, access_token, log).await?;

        let post_id = self
            .create_post(person_urn, &asset_urn, caption, access_token, log)
            .await?;

        Ok(PublishReceipt {
            platform: Platform::LinkedIn,
            post_id: post_id.clone(),
            payload: serde_json::json!({
                "post_id": post_id,
                "video_urn": asset_urn,
                "platform": "linkedin",
            }),
        })
    }

    /// Register the upload with the `feedshare-video` recipe.
    async fn register_upload(
        &self,
        person_urn: &str,
        access_token: &str,
    ) -> Result<(String, String), PublishError> {
        let url = format!("{}/assets?action=registerUpload", self.api_base_url);

        let payload = serde_json::json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-video"],
                "owner": person_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent",
                }],
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header(RESTLI_HEADER.0, RESTLI_HEADER.1)
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
            return Err(PublishError::Init {
                message: format!("registerUpload failed (HTTP {}): {body}", status.as_u16()),
            });
        }

        let data: RegisterUploadResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Init {
                message: format!("unexpected registerUpload response: {e}"),
            })?;

        let upload_url = data.value.upload_mechanism
            ["com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest"]["uploadUrl"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| PublishError::Init {
                message: "no upload URL in registerUpload response".to_string(),
            })?;

        Ok((data.value.asset, upload_url))
    }

    /// PUT the bytes to the issued upload URL.
    async fn upload_bytes(
        &self,
        upload_url: &str,
        access_token: &str,
        video_data: Vec<u8>,
        log: &mut JobLog,
    ) -> Result<(), PublishError> {
        log.info(format!("Uploading {} bytes to LinkedIn", video_data.len()));
        let response = self
            .client
            .put(upload_url)
            .bearer_auth(access_token)
            .header("Content-Type", "application/octet-stream")
            .body(video_data)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| PublishError::Network { source: e })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            log.error(format!("Video upload failed: HTTP {status}"));
            return Err(PublishError::Chunk {
                offset: 0,
                message: format!("HTTP {status}: {body}"),
            });
        }
        log.info("Video uploaded");
        Ok(())
    }

    /// Poll the asset until AVAILABLE/ALLOWED.
    ///
    /// FAILED and PROCESSING_FAILED fail the destination; running past the
    /// budget does too: unlike Instagram, LinkedIn will not publish a post
    /// for an asset that never became usable.
    async fn wait_for_processing(
        &self,
        asset_urn: &str,
        access_token: &str,
        log: &mut JobLog,
    ) -> Result<(), PublishError> {
        let asset_id = asset_urn.rsplit(':').next().unwrap_or(asset_urn);
        let url = format!("{}/assets/{asset_id}", self.api_base_url);

        let mut elapsed = Duration::ZERO;
        while elapsed < MAX_PROCESSING_WAIT {
            let response = self
                .client
                .get(&url)
                .bearer_auth(access_token)
                .header(RESTLI_HEADER.0, RESTLI_HEADER.1)
                .timeout(API_TIMEOUT)
                .send()
                .await
                .map_err(|e| PublishError::Network { source: e })?;

            if response.status().is_success() {
                let data: AssetStatusResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| PublishError::Processing {
                            message: format!("unexpected asset response: {e}"),
                        })?;
                let status = data.status.unwrap_or_default();
                log.info(format!("Video processing status: {status}"));

                match status.as_str() {
                    "AVAILABLE" | "ALLOWED" => return Ok(()),
                    "FAILED" | "PROCESSING_FAILED" => {
                        return Err(PublishError::Processing {
                            message: format!("video processing failed with status: {status}"),
                        });
                    }
                    _ => {}
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            elapsed += self.poll_interval.max(Duration::from_millis(1));
        }

        log.error("Video processing timed out");
        Err(PublishError::Processing {
            message: format!(
                "processing timed out after {}s",
                MAX_PROCESSING_WAIT.as_secs()
            ),
        })
    }

    /// Create the UGC post referencing the processed asset.
    async fn create_post(
        &self,
        person_urn: &str,
        asset_urn: &str,
        caption: &str,
        access_token: &str,
        log: &mut JobLog,
    ) -> Result<String, PublishError> {
        let url = format!("{}/ugcPosts", self.api_base_url);

        let payload = serde_json::json!({
            "author": person_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": caption },
                    "shareMediaCategory": "VIDEO",
                    "media": [{
                        "status": "READY",
                        "media": asset_urn,
                    }],
                },
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        });

        log.info("Creating LinkedIn post");
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header(RESTLI_HEADER.0, RESTLI_HEADER.1)
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
                "Post creation failed (HTTP {}): {body}",
                status.as_u16()
            ));
            return Err(PublishError::Publish {
                message: format!("ugcPost failed (HTTP {}): {body}", status.as_u16()),
            });
        }

        let data: UgcPostResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Publish {
                message: format!("unexpected ugcPost response: {e}"),
            })?;

        log.info(format!("LinkedIn post created: {}", data.id));
        Ok(data.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn register_body(server: &MockServer) -> serde_json::Value {
        serde_json::json!({
            "value": {
                "asset": "urn:li:digitalmediaAsset:A1",
                "uploadMechanism": {
                    "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                        "uploadUrl": format!("{}/media-upload/A1", server.uri()),
                    },
                },
            },
        })
    }

    fn test_client(server: &MockServer) -> LinkedInClient {
        LinkedInClient::new(reqwest::Client::new(), server.uri())
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn full_flow_creates_post() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 1024]))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/assets"))
            .and(query_param("action", "registerUpload"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(body_string_contains("feedshare-video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(register_body(&server)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/media-upload/A1"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/assets/A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "AVAILABLE"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ugcPosts"))
            .and(body_string_contains("PUBLISHED"))
            .and(body_string_contains("shareMediaCategory"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "urn:li:ugcPost:111"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("linkedin:L1");
        let receipt = client
            .post_video(
                "urn:li:person:L1",
                "li-token",
                &format!("{}/v.mp4", server.uri()),
                "a caption",
                &mut log,
            )
            .await
            .expect("publish");

        assert_eq!(receipt.post_id, "urn:li:ugcPost:111");
        assert_eq!(receipt.payload["video_urn"], "urn:li:digitalmediaAsset:A1");
    }

    #[tokio::test]
    async fn allowed_status_also_passes_processing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 64]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(register_body(&server)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/media-upload/A1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assets/A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ALLOWED"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "urn:li:ugcPost:2"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("linkedin:L1");
        client
            .post_video(
                "urn:li:person:L1",
                "t",
                &format!("{}/v.mp4", server.uri()),
                "",
                &mut log,
            )
            .await
            .expect("publish");
    }

    #[tokio::test]
    async fn processing_failed_fails_destination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 64]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(register_body(&server)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/media-upload/A1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assets/A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "PROCESSING_FAILED"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("linkedin:L1");
        let err = client
            .post_video(
                "urn:li:person:L1",
                "t",
                &format!("{}/v.mp4", server.uri()),
                "",
                &mut log,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Processing { .. }));
    }

    #[tokio::test]
    async fn register_rejection_is_init_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("linkedin:L1");
        let err = client
            .post_video(
                "urn:li:person:L1",
                "bad",
                "https://unused.example/v.mp4",
                "",
                &mut log,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Init { .. }));
    }
}
