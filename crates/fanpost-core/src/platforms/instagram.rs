//! Instagram Reels publishing via the Graph API resumable upload protocol.
//!
//! Four phases: fetch the blob to scratch disk (the init call needs the
//! exact file size), create the media container + upload session, push the
//! bytes in 5 MiB chunks, then poll the container and publish when it
//! reaches FINISHED. If the container is still processing when the poll
//! budget runs out, the upload is reported as a *success* with
//! `status: "processing"`; Instagram finalizes autonomously.
//! TODO: reconciliation poll that later swaps the container id for the real
//! media id on such rows.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncReadExt;

use super::facebook::graph_error_message;
use super::{JobLog, Platform, PublishReceipt};
use crate::error::PublishError;
use crate::net;

/// Chunk size for the resumable upload.
const CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Timeout for Graph API JSON calls.
const GRAPH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single chunk POST.
const CHUNK_TIMEOUT: Duration = Duration::from_secs(120);

/// Container status polls before giving up and reporting `processing`.
const MAX_POLL_ATTEMPTS: u32 = 5;

/// Default pause between container status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Client for the Instagram Graph API (Business accounts).
pub struct InstagramClient {
    client: reqwest::Client,
    graph_base_url: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    id: String,
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: String,
}

impl InstagramClient {
    /// Create a client against the given Graph API base URL.
    pub fn new(client: reqwest::Client, graph_base_url: String) -> Self {
        Self {
            client,
            graph_base_url,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Publish a reel to an Instagram Business account.
    pub async fn post_reel(
        &self,
        instagram_account_id: &str,
        access_token: &str,
        video_url: &str,
        caption: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        // The scratch file drops (and deletes) on every exit path.
        log.info(format!("Downloading video from {video_url}"));
        let (file, file_size) = net::download_to_file(
            &self.client,
            video_url,
            net::DOWNLOAD_TIMEOUT,
        )
        .await?;
        log.info(format!("Downloaded {file_size} bytes to scratch"));

        let (container_id, upload_uri) = self
            .init_resumable_upload(instagram_account_id, access_token, file_size, caption, log)
            .await?;

        self.upload_chunks(&upload_uri, access_token, file.path(), file_size, log)
            .await?;

        self.poll_and_publish(
            instagram_account_id,
            access_token,
            &container_id,
            log,
        )
        .await
    }

    /// Create the media container and upload session.
    async fn init_resumable_upload(
        &self,
        instagram_account_id: &str,
        access_token: &str,
        file_size: u64,
        caption: &str,
        log: &mut JobLog,
    ) -> Result<(String, String), PublishError> {
        let url = format!("{}/{instagram_account_id}/media", self.graph_base_url);
        let file_size_str = file_size.to_string();

        let mut params = vec![
            ("access_token", access_token),
            ("media_type", "REELS"),
            ("upload_type", "resumable"),
            ("file_size", file_size_str.as_str()),
            ("share_to_feed", "true"),
        ];
        if !caption.is_empty() {
            params.push(("caption", caption));
        }

        log.info(format!(
            "Initializing Instagram resumable upload ({file_size} bytes)"
        ));
        let response = self
            .client
            .post(&url)
            .form(&params)
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
            log.error(format!("Upload init failed: {message}"));
            return Err(PublishError::Init { message });
        }

        let data: InitResponse = serde_json::from_str(&body).map_err(|e| PublishError::Init {
            message: format!("unexpected init response: {e}"),
        })?;

        let upload_uri = data.uri.ok_or_else(|| PublishError::Init {
            message: "no upload URI in init response".to_string(),
        })?;

        log.info(format!(
            "Container created: container_id={}, upload session ready",
            data.id
        ));
        Ok((data.id, upload_uri))
    }

    /// Push the file to the upload URI in 5 MiB chunks.
    ///
    /// The offset advances only on an accepted chunk (200/201/206); any
    /// other status fails the destination.
    async fn upload_chunks(
        &self,
        upload_uri: &str,
        access_token: &str,
        path: &std::path::Path,
        file_size: u64,
        log: &mut JobLog,
    ) -> Result<(), PublishError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| PublishError::Download {
                message: format!("failed to reopen scratch file: {e}"),
            })?;

        let total_chunks = file_size.div_ceil(CHUNK_SIZE as u64);
        let mut offset: u64 = 0;
        let mut chunk_index: u64 = 0;

        while offset < file_size {
            let remaining = (file_size - offset) as usize;
            let this_chunk = remaining.min(CHUNK_SIZE);
            let mut buf = vec![0u8; this_chunk];
            file.read_exact(&mut buf)
                .await
                .map_err(|e| PublishError::Download {
                    message: format!("failed to read scratch file: {e}"),
                })?;

            chunk_index += 1;
            log.info(format!(
                "Uploading chunk {chunk_index}/{total_chunks}: offset={offset}, size={this_chunk}"
            ));

            let response = self
                .client
                .post(upload_uri)
                .header("Authorization", format!("OAuth {access_token}"))
                .header("offset", offset.to_string())
                .header("file_size", file_size.to_string())
                .body(buf)
                .timeout(CHUNK_TIMEOUT)
                .send()
                .await
                .map_err(|e| PublishError::Network { source: e })?;

            let status = response.status().as_u16();
            if !matches!(status, 200 | 201 | 206) {
                let body = response.text().await.unwrap_or_default();
                log.error(format!(
                    "Chunk upload failed: status={status}, offset={offset}"
                ));
                return Err(PublishError::Chunk {
                    offset,
                    message: format!("HTTP {status}: {body}"),
                });
            }

            offset += this_chunk as u64;
        }

        log.info(format!("Video uploaded: {file_size} bytes in {chunk_index} chunks"));
        Ok(())
    }

    /// Poll the container until FINISHED, then publish. Budget exhaustion
    /// is a success with `status: "processing"`.
    async fn poll_and_publish(
        &self,
        instagram_account_id: &str,
        access_token: &str,
        container_id: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            let status_url = format!("{}/{container_id}", self.graph_base_url);
            let response = self
                .client
                .get(&status_url)
                .query(&[
                    ("access_token", access_token),
                    ("fields", "status_code"),
                ])
                .timeout(GRAPH_TIMEOUT)
                .send()
                .await
                .map_err(|e| PublishError::Network { source: e })?;

            if response.status().is_success() {
                let data: StatusResponse =
                    response
                        .json()
                        .await
                        .map_err(|e| PublishError::Processing {
                            message: format!("unexpected status response: {e}"),
                        })?;
                let status_code = data.status_code.unwrap_or_default();
                log.info(format!(
                    "Container status: {status_code} (attempt {attempt}/{MAX_POLL_ATTEMPTS})"
                ));

                match status_code.as_str() {
                    "FINISHED" => {
                        return self
                            .publish_container(
                                instagram_account_id,
                                access_token,
                                container_id,
                                log,
                            )
                            .await;
                    }
                    "ERROR" => {
                        log.error("Instagram reported an error processing the video");
                        return Err(PublishError::Processing {
                            message: "Instagram reported an error processing the video"
                                .to_string(),
                        });
                    }
                    // IN_PROGRESS / PUBLISHED: keep waiting.
                    _ => {}
                }
            } else {
                log.warn(format!(
                    "Failed to check container status: HTTP {}",
                    response.status().as_u16()
                ));
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        // Still processing; Instagram publishes it autonomously when ready.
        log.info(format!(
            "Container {container_id} still processing; it will publish automatically"
        ));
        Ok(PublishReceipt {
            platform: Platform::Instagram,
            post_id: container_id.to_string(),
            payload: serde_json::json!({
                "container_id": container_id,
                "post_id": container_id,
                "platform": "instagram",
                "instagram_account_id": instagram_account_id,
                "status": "processing",
                "message": "Video uploaded. Instagram is processing it and will publish shortly.",
            }),
        })
    }

    /// Publish a FINISHED container.
    async fn publish_container(
        &self,
        instagram_account_id: &str,
        access_token: &str,
        container_id: &str,
        log: &mut JobLog,
    ) -> Result<PublishReceipt, PublishError> {
        let url = format!("{}/{instagram_account_id}/media_publish", self.graph_base_url);

        log.info("Publishing Instagram reel");
        let response = self
            .client
            .post(&url)
            .query(&[
                ("access_token", access_token),
                ("creation_id", container_id),
            ])
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
            log.error(format!("Publish failed: {message}"));
            return Err(PublishError::Publish { message });
        }

        let data: PublishResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Publish {
                message: format!("unexpected publish response: {e}"),
            })?;

        log.info(format!("Instagram reel published: {}", data.id));
        Ok(PublishReceipt {
            platform: Platform::Instagram,
            post_id: data.id.clone(),
            payload: serde_json::json!({
                "media_id": data.id,
                "post_id": data.id,
                "platform": "instagram",
                "instagram_account_id": instagram_account_id,
                "status": "published",
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_video(server: &MockServer, bytes: usize) {
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; bytes]))
            .mount(server)
            .await;
    }

    fn test_client(server: &MockServer) -> InstagramClient {
        InstagramClient::new(reqwest::Client::new(), server.uri())
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn publishes_when_container_finishes() {
        let server = MockServer::start().await;
        mount_video(&server, 2048).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .and(body_string_contains("media_type=REELS"))
            .and(body_string_contains("upload_type=resumable"))
            .and(body_string_contains("file_size=2048"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "C777",
                "uri": format!("{}/rupload/C777", server.uri()),
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rupload/C777"))
            .and(header("offset", "0"))
            .and(header("file_size", "2048"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/C777"))
            .and(query_param("fields", "status_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": "FINISHED"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/IG1/media_publish"))
            .and(query_param("creation_id", "C777"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "M999"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        let receipt = client
            .post_reel(
                "IG1",
                "ig-token",
                &format!("{}/v.mp4", server.uri()),
                "hello reels",
                &mut log,
            )
            .await
            .expect("publish");

        assert_eq!(receipt.post_id, "M999");
        assert_eq!(receipt.payload["status"], "published");
    }

    #[tokio::test]
    async fn splits_large_video_into_chunks() {
        let server = MockServer::start().await;
        // 12 MiB -> 3 chunks of 5, 5, 2 MiB.
        let size = 12 * 1024 * 1024;
        mount_video(&server, size).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "C1",
                "uri": format!("{}/rupload/C1", server.uri()),
            })))
            .mount(&server)
            .await;

        // 206 is an accepted per-chunk status.
        Mock::given(method("POST"))
            .and(path("/rupload/C1"))
            .respond_with(ResponseTemplate::new(206))
            .expect(3)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": "FINISHED"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/IG1/media_publish"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "M1"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        client
            .post_reel(
                "IG1",
                "t",
                &format!("{}/v.mp4", server.uri()),
                "",
                &mut log,
            )
            .await
            .expect("publish");
    }

    #[tokio::test]
    async fn rejected_chunk_fails_destination() {
        let server = MockServer::start().await;
        mount_video(&server, 1024).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "C2",
                "uri": format!("{}/rupload/C2", server.uri()),
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rupload/C2"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        let err = client
            .post_reel("IG1", "t", &format!("{}/v.mp4", server.uri()), "", &mut log)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Chunk { offset: 0, .. }));
    }

    #[tokio::test]
    async fn container_error_fails_destination() {
        let server = MockServer::start().await;
        mount_video(&server, 1024).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "C3",
                "uri": format!("{}/rupload/C3", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rupload/C3"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/C3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": "ERROR"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        let err = client
            .post_reel("IG1", "t", &format!("{}/v.mp4", server.uri()), "", &mut log)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Processing { .. }));
    }

    #[tokio::test]
    async fn poll_exhaustion_is_processing_success() {
        let server = MockServer::start().await;
        mount_video(&server, 1024).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "C4",
                "uri": format!("{}/rupload/C4", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rupload/C4"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/C4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status_code": "IN_PROGRESS"
            })))
            .expect(5)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        let receipt = client
            .post_reel("IG1", "t", &format!("{}/v.mp4", server.uri()), "", &mut log)
            .await
            .expect("processing is a success");

        assert_eq!(receipt.post_id, "C4");
        assert_eq!(receipt.payload["status"], "processing");
        assert_eq!(receipt.payload["container_id"], "C4");
    }

    #[tokio::test]
    async fn missing_upload_uri_is_init_error() {
        let server = MockServer::start().await;
        mount_video(&server, 512).await;

        Mock::given(method("POST"))
            .and(path("/IG1/media"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "C5"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut log = JobLog::new("instagram:IG1");
        let err = client
            .post_reel("IG1", "t", &format!("{}/v.mp4", server.uri()), "", &mut log)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Init { .. }));
    }
}
