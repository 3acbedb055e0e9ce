//! # Error Handling
//!
//! Request-level error taxonomy and its mapping onto HTTP responses.
//!
//! ## Error Kinds:
//! Lower layers report their own typed errors (`StorageError`,
//! `TranscriptionError`, `AudioError`, `VocabularyError`). They are folded
//! into `AppError` at the handler boundary so every failure a client sees
//! falls into one of a few well-defined kinds:
//!
//! - **TranscriptionUnavailable**: no speech model loaded, or inference failed (503)
//! - **StorageUnavailable**: the database could not serve the request (503)
//! - **InvalidInput**: the client sent something we cannot use (400)
//! - **NotFound**: the addressed record does not exist (404)
//! - **Config / Internal**: server-side problems (500)
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "invalid_input",
//!     "message": "No audio file in upload",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use crate::audio::AudioError;
use crate::storage::StorageError;
use crate::transcription::TranscriptionError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Speech recognition cannot serve the request right now
    #[error("Transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    /// The event database failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Client sent invalid or unusable data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested record was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration file or environment variable problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else that went wrong on our side
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable name used in the `error.type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::TranscriptionUnavailable(_) => "transcription_unavailable",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::TranscriptionUnavailable(msg)
            | AppError::StorageUnavailable(msg)
            | AppError::InvalidInput(msg)
            | AppError::NotFound(msg)
            | AppError::Config(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## HTTP Status Code Mapping:
/// - TranscriptionUnavailable/StorageUnavailable → 503 (Service Unavailable)
/// - InvalidInput → 400 (Bad Request)
/// - NotFound → 404 (Not Found)
/// - Config/Internal → 500 (Internal Server Error)
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::TranscriptionUnavailable(_) | AppError::StorageUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error_type = self.kind(), "{}", self);
        } else {
            tracing::warn!(error_type = self.kind(), "{}", self);
        }

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.kind(),
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StorageError::InvalidInput(msg) => AppError::InvalidInput(msg),
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<TranscriptionError> for AppError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::InvalidAudio(msg) => AppError::InvalidInput(msg),
            other => AppError::TranscriptionUnavailable(other.to_string()),
        }
    }
}

impl From<AudioError> for AppError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Io(e) => AppError::Internal(format!("Upload handling failed: {}", e)),
            AudioError::Resample(msg) => AppError::Internal(format!("Resampling failed: {}", msg)),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::InvalidInput(format!("Malformed upload: {}", err))
    }
}

/// A blocking task was cancelled or panicked on the thread pool.
impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::TranscriptionUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::StorageUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_lower_layer_conversions() {
        let err: AppError = TranscriptionError::ModelNotLoaded.into();
        assert!(matches!(err, AppError::TranscriptionUnavailable(_)));

        let err: AppError = TranscriptionError::InvalidAudio("too short".into()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err: AppError = StorageError::NotFound { entity: "raw event", id: 7 }.into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StorageError::LockPoisoned.into();
        assert!(matches!(err, AppError::StorageUnavailable(_)));

        let err: AppError = AudioError::Empty.into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let response = AppError::InvalidInput("match_id must be positive".into()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "invalid_input");
        assert_eq!(json["error"]["message"], "match_id must be positive");
        assert!(json["error"]["timestamp"].is_string());
    }
}
