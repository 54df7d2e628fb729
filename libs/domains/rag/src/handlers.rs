//! HTTP handlers for the search endpoint

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use axum_helpers::AppError;
use axum_helpers::errors::responses::{
    BadGatewayResponse, InternalServerErrorResponse, InvalidQueryResponse,
    PayloadTooLargeResponse, ServiceUnavailableResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{OpenApi, ToSchema};

use crate::error::RagError;
use crate::models::{Query, RetrievedItem, SearchResult};
use crate::service::RagService;

/// Multipart form accepted by `POST /search`.
///
/// Exactly one of `query` or `image` must be provided.
#[derive(Debug, ToSchema)]
pub struct SearchForm {
    /// Text query
    pub query: Option<String>,
    /// Image file (PNG, JPEG or WebP)
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
    /// Number of items to retrieve
    pub top_k: Option<u32>,
}

/// Answer with the items it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub answer: String,
    /// Each item has `caption`, `url`, `score` and any extra index metadata
    #[schema(value_type = Vec<Object>)]
    pub retrieved_items: Vec<RetrievedItem>,
}

impl From<SearchResult> for SearchResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            answer: result.answer,
            retrieved_items: result.retrieved_items,
        }
    }
}

#[derive(Default)]
struct SearchParts {
    text: Option<String>,
    image: Option<Vec<u8>>,
    top_k: Option<usize>,
}

async fn read_search_form(mut multipart: Multipart) -> Result<SearchParts, AppError> {
    let mut parts = SearchParts::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("query") => parts.text = Some(field.text().await?),
            Some("image") => parts.image = Some(field.bytes().await?.to_vec()),
            Some("top_k") => {
                let raw = field.text().await?;
                let top_k = raw.trim().parse::<usize>().map_err(|_| {
                    RagError::InvalidQueryKind(format!("top_k must be a positive integer, got '{}'", raw.trim()))
                })?;
                parts.top_k = Some(top_k);
            }
            other => debug!(field = ?other, "Ignoring unknown form field"),
        }
    }

    Ok(parts)
}

/// Search the image collection with a text query or an image
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Generated answer and retrieved items", body = SearchResponse),
        (status = 400, response = InvalidQueryResponse),
        (status = 413, response = PayloadTooLargeResponse),
        (status = 500, response = InternalServerErrorResponse),
        (status = 502, response = BadGatewayResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
pub async fn search(
    State(service): State<Arc<RagService>>,
    multipart: Multipart,
) -> Result<Json<SearchResponse>, AppError> {
    let SearchParts { text, image, top_k } = read_search_form(multipart).await?;

    // Reject before decoding anything
    let top_k = Some(service.resolve_top_k(top_k)?);

    let query = tokio::task::spawn_blocking(move || Query::from_parts(text, image))
        .await
        .map_err(RagError::from)??;

    let result = service.search(query, top_k).await?;
    Ok(Json(result.into()))
}

/// OpenAPI documentation for the search API
#[derive(OpenApi)]
#[openapi(
    paths(search),
    components(schemas(SearchForm, SearchResponse)),
    tags(
        (name = "search", description = "Multimodal retrieval-augmented search")
    )
)]
pub struct RagApiDoc;

/// Create the search router
pub fn router(service: Arc<RagService>) -> Router {
    let body_limit = service.config().max_upload_bytes;

    Router::new()
        .route("/search", post(search))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}
