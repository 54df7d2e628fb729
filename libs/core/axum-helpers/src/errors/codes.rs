//! Error codes shared by every HTTP surface in the workspace.
//!
//! Each code has a stable SCREAMING_SNAKE_CASE identifier for clients, an
//! integer for logs and dashboards, a default message and an HTTP status.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error codes for client consumption and observability.
///
/// Integer ranges:
/// - 1000-1999: generic request and routing errors
/// - 6000-6999: search pipeline errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request body or form could not be parsed
    BadRequest,

    /// Uploaded payload exceeds the configured limit
    PayloadTooLarge,

    /// Route does not exist
    NotFound,

    /// HTTP method not allowed on the route
    MethodNotAllowed,

    /// Query is neither usable text nor a decodable image
    InvalidQuery,

    /// Vector index could not be reached
    IndexUnavailable,

    /// Index returned an entry without the required metadata
    MalformedIndexEntry,

    /// Image could not be described by the captioning model
    CaptioningFailed,

    /// Generative model failed or returned no usable completion
    GenerationFailed,

    /// Any other search pipeline failure
    PipelineFailure,
}

impl ErrorCode {
    /// Get the string representation for client consumption.
    ///
    /// ```rust
    /// use axum_helpers::errors::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::InvalidQuery.as_str(), "INVALID_QUERY");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::IndexUnavailable => "INDEX_UNAVAILABLE",
            Self::MalformedIndexEntry => "MALFORMED_INDEX_ENTRY",
            Self::CaptioningFailed => "CAPTIONING_FAILED",
            Self::GenerationFailed => "GENERATION_FAILED",
            Self::PipelineFailure => "PIPELINE_FAILURE",
        }
    }

    /// Get the integer code for logging and monitoring.
    pub fn code(&self) -> i32 {
        match self {
            Self::BadRequest => 1001,
            Self::PayloadTooLarge => 1002,
            Self::NotFound => 1004,
            Self::MethodNotAllowed => 1006,

            Self::InvalidQuery => 6001,
            Self::IndexUnavailable => 6002,
            Self::MalformedIndexEntry => 6003,
            Self::CaptioningFailed => 6004,
            Self::GenerationFailed => 6005,
            Self::PipelineFailure => 6099,
        }
    }

    /// HTTP status returned alongside this code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest | Self::InvalidQuery => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::IndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedIndexEntry | Self::GenerationFailed => StatusCode::BAD_GATEWAY,
            Self::CaptioningFailed | Self::PipelineFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the default user-facing error message.
    ///
    /// These never carry upstream detail; handlers may override them for
    /// client errors where the detail is the client's own input.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "Request could not be parsed",
            Self::PayloadTooLarge => "Uploaded payload is too large",
            Self::NotFound => "The requested resource was not found",
            Self::MethodNotAllowed => "The HTTP method is not allowed for this resource",
            Self::InvalidQuery => "Provide either a text query or an image",
            Self::IndexUnavailable => "The vector index is unavailable",
            Self::MalformedIndexEntry => "The vector index returned a malformed entry",
            Self::CaptioningFailed => "The image could not be described",
            Self::GenerationFailed => "The answer could not be generated",
            Self::PipelineFailure => "The search could not be completed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_string_representation() {
        assert_eq!(ErrorCode::InvalidQuery.as_str(), "INVALID_QUERY");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
        assert_eq!(ErrorCode::MalformedIndexEntry.as_str(), "MALFORMED_INDEX_ENTRY");
    }

    #[test]
    fn test_error_code_integer_codes() {
        assert_eq!(ErrorCode::BadRequest.code(), 1001);
        assert_eq!(ErrorCode::InvalidQuery.code(), 6001);
        assert_eq!(ErrorCode::PipelineFailure.code(), 6099);
    }

    #[test]
    fn test_pipeline_statuses() {
        assert_eq!(ErrorCode::InvalidQuery.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::IndexUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::MalformedIndexEntry.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::CaptioningFailed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::GenerationFailed.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::PipelineFailure.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::GenerationFailed.to_string(), "GENERATION_FAILED");
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::IndexUnavailable).unwrap();
        assert_eq!(json, "\"INDEX_UNAVAILABLE\"");

        let code: ErrorCode = serde_json::from_str("\"CAPTIONING_FAILED\"").unwrap();
        assert_eq!(code, ErrorCode::CaptioningFailed);
    }
}
