//! Error types for the fanpost core library.
//!
//! Each subsystem has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

/// Errors from the credential manager's token refresh protocols.
///
/// Any of these terminates the destination with `failed`; credential
/// failures are never retried, the user reconnects the account instead.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The stored token is expired and the account has no refresh token.
    #[error("access token expired and no refresh token available")]
    NoRefreshToken,

    /// The platform does not support token refresh at all.
    #[error("{platform} tokens are not refreshable")]
    NotRefreshable {
        /// The platform whose refresh was requested.
        platform: String,
    },

    /// The refresh endpoint rejected the request.
    #[error("token refresh failed (HTTP {status}): {message}")]
    RefreshRejected {
        /// The HTTP status code from the refresh endpoint.
        status: u16,
        /// The error message from the refresh endpoint.
        message: String,
    },

    /// Network-level failure reaching the refresh endpoint.
    #[error("token refresh network error: {source}")]
    Network {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// Persisting the refreshed triple failed.
    #[error("failed to store refreshed tokens: {source}")]
    Storage {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },
}

/// Errors from the platform publish protocols.
///
/// Adapters never swallow a terminal failure; every variant propagates to
/// the worker, which records it on the destination and marks it `failed`.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Downloading the source video failed.
    #[error("video download failed: {message}")]
    Download {
        /// Details about the download failure.
        message: String,
    },

    /// The source video exceeds the platform's size limit.
    #[error("video too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual size of the video in bytes.
        size: u64,
        /// The platform's maximum accepted size.
        max: u64,
    },

    /// The upload initialization step was rejected.
    #[error("upload initialization failed: {message}")]
    Init {
        /// The error message from the platform.
        message: String,
    },

    /// A chunk transfer was rejected.
    #[error("chunk upload failed at offset {offset}: {message}")]
    Chunk {
        /// Byte offset of the failed chunk.
        offset: u64,
        /// The error message from the platform.
        message: String,
    },

    /// The upload finalization step was rejected.
    #[error("upload finalization failed: {message}")]
    Finalize {
        /// The error message from the platform.
        message: String,
    },

    /// The platform reported a processing failure, or processing never
    /// finished within the adapter's budget where completion is required.
    #[error("media processing failed: {message}")]
    Processing {
        /// Details about the processing failure.
        message: String,
    },

    /// The final publish call was rejected.
    #[error("publish failed: {message}")]
    Publish {
        /// The error message from the platform.
        message: String,
    },

    /// Local retries exhausted on a transient failure.
    #[error("upload timed out after {attempts} attempts")]
    Timeout {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Network-level failure talking to the platform.
    #[error("platform network error: {source}")]
    Network {
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from the fan-out intake.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// A destination string does not parse as `<platform>:<entity_id>`.
    #[error("invalid destination format: {destination}")]
    BadDestination {
        /// The offending destination string.
        destination: String,
    },

    /// After dropping unknown destinations, none remain.
    #[error("no valid destinations in request")]
    NoDestinations,

    /// The work queue refused the job; the whole submit is rolled back.
    #[error("failed to enqueue job for {destination}: {message}")]
    Enqueue {
        /// The destination whose job could not be queued.
        destination: String,
        /// Why the enqueue failed.
        message: String,
    },

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "platforms.twitter.api_key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: platforms.twitter.api_key"
        );
    }

    #[test]
    fn credential_error_not_refreshable_message() {
        let err = CredentialError::NotRefreshable {
            platform: "twitter".to_string(),
        };
        assert_eq!(err.to_string(), "twitter tokens are not refreshable");
    }

    #[test]
    fn credential_error_refresh_rejected_message() {
        let err = CredentialError::RefreshRejected {
            status: 400,
            message: "invalid_grant".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token refresh failed (HTTP 400): invalid_grant"
        );
    }

    #[test]
    fn publish_error_too_large_message() {
        let err = PublishError::TooLarge {
            size: 600,
            max: 512,
        };
        assert_eq!(err.to_string(), "video too large: 600 bytes (max 512)");
    }

    #[test]
    fn publish_error_chunk_message() {
        let err = PublishError::Chunk {
            offset: 5_242_880,
            message: "session expired".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "chunk upload failed at offset 5242880: session expired"
        );
    }

    #[test]
    fn publish_error_timeout_message() {
        let err = PublishError::Timeout { attempts: 3 };
        assert_eq!(err.to_string(), "upload timed out after 3 attempts");
    }

    #[test]
    fn intake_error_bad_destination_message() {
        let err = IntakeError::BadDestination {
            destination: "myspace:123".to_string(),
        };
        assert_eq!(err.to_string(), "invalid destination format: myspace:123");
    }

    #[test]
    fn intake_error_no_destinations_message() {
        let err = IntakeError::NoDestinations;
        assert_eq!(err.to_string(), "no valid destinations in request");
    }
}
