//! Reusable OpenAPI response types for consistent API documentation.

use super::ErrorResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Invalid query",
    content_type = "application/json",
    example = json!({
        "code": 6001,
        "error": "INVALID_QUERY",
        "message": "Provide either a text query or an image"
    })
)]
pub struct InvalidQueryResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Payload Too Large",
    content_type = "application/json",
    example = json!({
        "code": 1002,
        "error": "PAYLOAD_TOO_LARGE",
        "message": "Uploaded payload is too large"
    })
)]
pub struct PayloadTooLargeResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Internal Server Error",
    content_type = "application/json",
    example = json!({
        "code": 6099,
        "error": "PIPELINE_FAILURE",
        "message": "The search could not be completed"
    })
)]
pub struct InternalServerErrorResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Gateway - Upstream returned an unusable response",
    content_type = "application/json",
    example = json!({
        "code": 6005,
        "error": "GENERATION_FAILED",
        "message": "The answer could not be generated"
    })
)]
pub struct BadGatewayResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Service Unavailable",
    content_type = "application/json",
    example = json!({
        "code": 6002,
        "error": "INDEX_UNAVAILABLE",
        "message": "The vector index is unavailable"
    })
)]
pub struct ServiceUnavailableResponse(pub ErrorResponse);
