//! Blob store interface: time-limited signed upload URLs and public read
//! URLs for stored videos.
//!
//! Serving the bytes is an external collaborator's job; the core only
//! mints upload URLs for the browser (`POST /upload-url`) and derives the
//! public read URL that intake hands to the platform adapters. Signatures
//! are HMAC-SHA256 over `key\nexpires` so the storage frontend can verify
//! a PUT without any shared state beyond the secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::BlobConfig;

type HmacSha256 = Hmac<Sha256>;

/// A minted upload slot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedUpload {
    /// Signed, time-limited PUT URL.
    pub upload_url: String,
    /// Object key under the bucket.
    pub s3_key: String,
    /// Bucket namespace.
    pub bucket: String,
}

/// Mints signed upload URLs and derives public read URLs.
#[derive(Debug, Clone)]
pub struct BlobStore {
    bucket: String,
    public_base_url: String,
    signing_secret: String,
    url_ttl_seconds: u64,
}

impl BlobStore {
    /// Create a store from configuration.
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_secret: config.signing_secret.clone(),
            url_ttl_seconds: config.url_ttl_seconds,
        }
    }

    /// Mint an upload slot for a user's video file.
    ///
    /// Keys are laid out `uploads/<user_id>/<uuid>.<ext>` so one user's
    /// objects never collide with another's.
    pub fn issue_upload_url(&self, user_id: &str, filename: &str) -> IssuedUpload {
        let extension = filename
            .rsplit('.')
            .next()
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && *ext != filename)
            .unwrap_or("mp4");
        let key = format!("uploads/{user_id}/{}.{extension}", uuid::Uuid::new_v4());

        let expires = chrono::Utc::now().timestamp() + self.url_ttl_seconds as i64;
        let signature = self.sign(&key, expires);

        IssuedUpload {
            upload_url: format!(
                "{}/{key}?expires={expires}&signature={signature}",
                self.public_base_url
            ),
            s3_key: key,
            bucket: self.bucket.clone(),
        }
    }

    /// Public read URL for a stored object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    /// Verify an upload signature. Used by the storage frontend; kept here
    /// so minting and verification share one implementation.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        if chrono::Utc::now().timestamp() > expires {
            return false;
        }
        let expected = self.sign(key, expires);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    fn sign(&self, key: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
