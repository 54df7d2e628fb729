use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "RAG API",
        version = "0.1.0",
        description = "Multimodal retrieval-augmented search over a captioned image collection"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
struct BaseApiDoc;

/// Application API documentation: the base document with the search API merged in.
///
/// The search routes sit at the API root, so the domain document is merged
/// rather than nested under a prefix.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = BaseApiDoc::openapi();
        doc.merge(domain_rag::RagApiDoc::openapi());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path_documented() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/search"));
        assert_eq!(doc.info.title, "RAG API");
    }
}
