pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Standard error response structure.
///
/// Returned for every error response:
/// - `code`: integer error code for logging/monitoring (e.g., 6002)
/// - `error`: machine-readable error identifier (e.g., "INDEX_UNAVAILABLE")
/// - `message`: human-readable error message
/// - `details`: optional additional error details
///
/// # JSON Example
///
/// ```json
/// {
///   "code": 6002,
///   "error": "INDEX_UNAVAILABLE",
///   "message": "The vector index is unavailable"
/// }
/// ```
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that can be converted to HTTP responses.
///
/// Domain crates convert their own errors into [`AppError::Domain`] with the
/// matching [`ErrorCode`]; the status is derived from the code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Malformed or oversized multipart upload
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Error carrying a specific code. `message` is shown to clients as-is.
    #[error("{code}: {message}")]
    Domain { code: ErrorCode, message: String },
}

impl AppError {
    /// The error code this error maps to.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ErrorCode::PayloadTooLarge
            }
            AppError::Multipart(_) => ErrorCode::BadRequest,
            AppError::Domain { code, .. } => *code,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let status = code.status();

        let message = match self {
            AppError::Multipart(e) => {
                tracing::info!(error_code = code.code(), "Multipart error: {}", e);
                e.body_text()
            }
            AppError::Domain { message, .. } => {
                if status.is_server_error() {
                    tracing::error!(error_code = code.code(), error = %code, "{}", message);
                } else {
                    tracing::info!(error_code = code.code(), error = %code, "{}", message);
                }
                message
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Helper function to create error responses.
///
/// ```rust,ignore
/// use axum_helpers::errors::{error_response, ErrorCode};
///
/// let response = error_response(ErrorCode::InvalidQuery, "top_k must be positive");
/// ```
pub fn error_response(error_code: ErrorCode, message: impl Into<String>) -> Response {
    (
        error_code.status(),
        Json(ErrorResponse::new(error_code, message)),
    )
        .into_response()
}
