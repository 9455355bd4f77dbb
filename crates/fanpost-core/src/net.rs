//! Bounded blob download helpers shared by the platform adapters.
//!
//! Instagram needs the video on scratch disk (the resumable chunk loop
//! reads from a file); the other platforms buffer in memory with an
//! explicit size cap. Both paths stream the response instead of slurping
//! an unbounded body.

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use tempfile::NamedTempFile;

use crate::error::PublishError;

/// Default timeout for blob downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Download a blob into memory, enforcing a maximum size.
///
/// The cap is checked as chunks arrive, so an oversized blob fails before
/// it is fully transferred.
pub async fn download_to_memory(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
    timeout: Duration,
) -> Result<Vec<u8>, PublishError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| PublishError::Network { source: e })?;

    if !response.status().is_success() {
        return Err(PublishError::Download {
            message: format!("HTTP {} fetching video", response.status().as_u16()),
        });
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(PublishError::TooLarge {
                size: len,
                max: max_bytes,
            });
        }
    }

    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PublishError::Network { source: e })?;
        if (data.len() + chunk.len()) as u64 > max_bytes {
            return Err(PublishError::TooLarge {
                size: (data.len() + chunk.len()) as u64,
                max: max_bytes,
            });
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() {
        return Err(PublishError::Download {
            message: "video is empty".to_string(),
        });
    }

    Ok(data)
}

/// Download a blob to a scratch file, returning the file and its size.
///
/// The temporary file is deleted when the handle drops, so every exit path
/// releases the scratch space.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(NamedTempFile, u64), PublishError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| PublishError::Network { source: e })?;

    if !response.status().is_success() {
        return Err(PublishError::Download {
            message: format!("HTTP {} fetching video", response.status().as_u16()),
        });
    }

    let mut file = NamedTempFile::new().map_err(|e| PublishError::Download {
        message: format!("failed to create scratch file: {e}"),
    })?;

    let mut size: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PublishError::Network { source: e })?;
        file.write_all(&chunk).map_err(|e| PublishError::Download {
            message: format!("failed to write scratch file: {e}"),
        })?;
        size += chunk.len() as u64;
    }

    if size == 0 {
        return Err(PublishError::Download {
            message: "video is empty".to_string(),
        });
    }

    file.flush().map_err(|e| PublishError::Download {
        message: format!("failed to flush scratch file: {e}"),
    })?;

    Ok((file, size))
}
