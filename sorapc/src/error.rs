//! Application-wide error types.

use serde::Serialize;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", no_eligible_message(*require_pro))]
    NoEligibleCredential { require_pro: bool },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Empty identifier: {0} must not be blank")]
    EmptyIdentifier(&'static str),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("No published URL for task {task_id}")]
    NoPublishedUrl { task_id: String },

    #[error("Watermark removal endpoint has no access token configured")]
    WatermarkCredentialMissing,

    #[error("Watermark removal returned no usable URL")]
    NoWatermarkFreeUrl,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error during {op} on {path}: {source}")]
    IoPath {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn no_eligible_message(require_pro: bool) -> &'static str {
    if require_pro {
        "No eligible Pro credential: add an active Pro-tier token with remaining video quota"
    } else {
        "No eligible credential: add an active video-enabled token with remaining quota"
    }
}

/// Coarse classification surfaced to callers next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NoEligibleCredential,
    MalformedPayload,
    EmptyIdentifier,
    NotFound,
    PrerequisiteMissing,
    NoPublishedUrl,
    WatermarkCredentialMissing,
    NoWatermarkFreeUrl,
    DownloadFailed,
    StorageUnavailable,
    NetworkError,
    Invalid,
}

/// Structured failure reason handed to the caller instead of a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn prerequisite(msg: impl Into<String>) -> Self {
        Self::PrerequisiteMissing(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn io_path(op: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.display().to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoEligibleCredential { .. } => ErrorKind::NoEligibleCredential,
            Self::MalformedPayload(_) | Self::Serialization(_) => ErrorKind::MalformedPayload,
            Self::EmptyIdentifier(_) => ErrorKind::EmptyIdentifier,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PrerequisiteMissing(_) => ErrorKind::PrerequisiteMissing,
            Self::NoPublishedUrl { .. } => ErrorKind::NoPublishedUrl,
            Self::WatermarkCredentialMissing => ErrorKind::WatermarkCredentialMissing,
            Self::NoWatermarkFreeUrl => ErrorKind::NoWatermarkFreeUrl,
            Self::DownloadFailed(_) => ErrorKind::DownloadFailed,
            Self::DatabaseSqlx(_) | Self::Migration(_) => ErrorKind::StorageUnavailable,
            Self::Network(_) | Self::UpstreamStatus { .. } => ErrorKind::NetworkError,
            Self::IoPath { .. } | Self::Io(_) => ErrorKind::DownloadFailed,
            Self::Validation(_) | Self::Configuration(_) => ErrorKind::Invalid,
        }
    }

    pub fn failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        err.failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_eligible_message_distinguishes_pro() {
        let pro = Error::NoEligibleCredential { require_pro: true }.to_string();
        let any = Error::NoEligibleCredential { require_pro: false }.to_string();
        assert_ne!(pro, any);
        assert!(pro.contains("Pro"));
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let failure = Error::NoPublishedUrl {
            task_id: "task_1".into(),
        }
        .failure();
        assert_eq!(failure.kind, ErrorKind::NoPublishedUrl);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "no_published_url");
        assert!(json["message"].as_str().unwrap().contains("task_1"));
        assert_eq!(ErrorKind::StorageUnavailable.to_string(), "storage_unavailable");
    }

    #[test]
    fn test_upstream_status_is_network_error() {
        let err = Error::UpstreamStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }
}
