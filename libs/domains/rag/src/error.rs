use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, ErrorCode};
use core_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid query: {0}")]
    InvalidQueryKind(String),

    #[error("Captioning failed: {0}")]
    CaptioningFailed(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Malformed index entry {id}: {reason}")]
    MalformedIndexEntry { id: String, reason: String },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Pipeline failure: {0}")]
    PipelineFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    /// Error code reported at the HTTP boundary and in metrics.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RagError::InvalidQueryKind(_) => ErrorCode::InvalidQuery,
            RagError::CaptioningFailed(_) => ErrorCode::CaptioningFailed,
            RagError::IndexUnavailable(_) => ErrorCode::IndexUnavailable,
            RagError::MalformedIndexEntry { .. } => ErrorCode::MalformedIndexEntry,
            RagError::GenerationFailed(_) => ErrorCode::GenerationFailed,
            RagError::PipelineFailure(_) | RagError::Config(_) => ErrorCode::PipelineFailure,
        }
    }
}

impl From<ConfigError> for RagError {
    fn from(err: ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::IndexUnavailable(format!("Qdrant error: {}", err))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::PipelineFailure(format!("HTTP error: {}", err))
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::PipelineFailure(format!("JSON error: {}", err))
    }
}

impl From<candle_core::Error> for RagError {
    fn from(err: candle_core::Error) -> Self {
        RagError::PipelineFailure(format!("Inference error: {}", err))
    }
}

impl From<image::ImageError> for RagError {
    fn from(err: image::ImageError) -> Self {
        RagError::InvalidQueryKind(format!("Image could not be decoded: {}", err))
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(err: tokio::task::JoinError) -> Self {
        RagError::PipelineFailure(format!("Blocking task failed: {}", err))
    }
}

/// Convert RagError to AppError for standardized HTTP error responses.
///
/// Only client errors keep their message; everything else is reported with
/// the code's generic message so upstream detail never reaches the caller.
impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let code = err.error_code();
        let message = match err {
            RagError::InvalidQueryKind(msg) => msg,
            other => {
                tracing::error!(error = %other, "Search pipeline error");
                code.default_message().to_string()
            }
        };
        AppError::Domain { code, message }
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RagError::InvalidQueryKind("x".into()).error_code(),
            ErrorCode::InvalidQuery
        );
        assert_eq!(
            RagError::MalformedIndexEntry {
                id: "1".into(),
                reason: "missing caption".into()
            }
            .error_code(),
            ErrorCode::MalformedIndexEntry
        );
        assert_eq!(
            RagError::Config("x".into()).error_code(),
            ErrorCode::PipelineFailure
        );
    }

    #[test]
    fn test_statuses() {
        let cases = [
            (RagError::InvalidQueryKind("x".into()), StatusCode::BAD_REQUEST),
            (RagError::IndexUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RagError::CaptioningFailed("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (RagError::GenerationFailed("x".into()), StatusCode::BAD_GATEWAY),
            (RagError::PipelineFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_upstream_detail_not_exposed() {
        let app: AppError = RagError::GenerationFailed("quota exceeded for key abc".into()).into();
        match app {
            AppError::Domain { code, message } => {
                assert_eq!(code, ErrorCode::GenerationFailed);
                assert!(!message.contains("quota"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_client_error_keeps_message() {
        let app: AppError = RagError::InvalidQueryKind("top_k must be at least 1".into()).into();
        match app {
            AppError::Domain { message, .. } => assert_eq!(message, "top_k must be at least 1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
