/// Error taxonomy for the ROTA media subsystem
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for media storage and document caching
#[derive(Error, Debug)]
pub enum MediaError {
    /// Empty or malformed caller arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A path resolved outside the storage root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Extension not in the allow-list for this kind of upload
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Byte ceiling exceeded
    #[error("Payload too large (max {max} bytes)")]
    PayloadTooLarge { max: u64 },

    /// Upload or download produced zero bytes
    #[error("Payload is empty")]
    EmptyPayload,

    /// Referenced local file is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport, timeout or protocol failure while downloading
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Storage root misconfigured
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unexpected local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Stable code identifying the kind of failure
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::InvalidInput(_) => "InvalidInput",
            MediaError::InvalidPath(_) => "InvalidPath",
            MediaError::UnsupportedFormat(_) => "UnsupportedFormat",
            MediaError::PayloadTooLarge { .. } => "PayloadTooLarge",
            MediaError::EmptyPayload => "EmptyPayload",
            MediaError::NotFound(_) => "NotFound",
            MediaError::DownloadFailed(_) => "DownloadFailed",
            MediaError::StorageUnavailable(_) => "StorageUnavailable",
            MediaError::Io(_) => "Io",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            MediaError::InvalidInput(_)
            | MediaError::InvalidPath(_)
            | MediaError::UnsupportedFormat(_)
            | MediaError::EmptyPayload => StatusCode::BAD_REQUEST,
            MediaError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            MediaError::NotFound(_) => StatusCode::NOT_FOUND,
            MediaError::DownloadFailed(_) => StatusCode::BAD_GATEWAY,
            MediaError::StorageUnavailable(_) | MediaError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body returned by the upload endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MediaError to HTTP response
impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            MediaError::StorageUnavailable(_) | MediaError::Io(_) => {
                tracing::error!("Media storage failure: {}", self);
                "Internal server error".to_string() // Don't leak details
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            MediaError::InvalidInput("x".into()),
            MediaError::InvalidPath("x".into()),
            MediaError::UnsupportedFormat("x".into()),
            MediaError::PayloadTooLarge { max: 1 },
            MediaError::EmptyPayload,
            MediaError::NotFound("x".into()),
            MediaError::DownloadFailed("x".into()),
            MediaError::StorageUnavailable("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            MediaError::PayloadTooLarge { max: 10 }.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            MediaError::UnsupportedFormat(".bmp".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MediaError::DownloadFailed("timeout".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
