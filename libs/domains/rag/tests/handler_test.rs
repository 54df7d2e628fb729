//! Handler tests for the RAG domain
//!
//! These drive the search router end to end with deterministic collaborators:
//! - Multipart parsing (text, image, top_k)
//! - Response serialization
//! - HTTP status codes and error bodies

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain_rag::*;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt; // For oneshot()

const BOUNDARY: &str = "rag-handler-test";

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

fn multipart_request(parts: Vec<Part<'_>>) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/search")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

// ===== Deterministic collaborators =====

#[derive(Default)]
struct Calls {
    embed: AtomicUsize,
    caption: AtomicUsize,
    generate: AtomicUsize,
}

struct FakeEmbedder(Arc<Calls>);

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, query: &Query) -> RagResult<EmbeddingVector> {
        self.0.embed.fetch_add(1, Ordering::SeqCst);
        match query {
            Query::Text(_) => EmbeddingVector::normalized(vec![1.0, 0.0]),
            Query::Image(_) => EmbeddingVector::normalized(vec![0.0, 1.0]),
        }
    }
}

struct FakeCaptioner(Arc<Calls>);

#[async_trait]
impl Captioner for FakeCaptioner {
    async fn caption(&self, _image: Arc<RgbImage>) -> RagResult<String> {
        self.0.caption.fetch_add(1, Ordering::SeqCst);
        Ok("a red square".to_string())
    }
}

struct FakeRetriever {
    available: bool,
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, _vector: &EmbeddingVector, top_k: usize) -> RagResult<Vec<RetrievedItem>> {
        if !self.available {
            return Err(RagError::IndexUnavailable("connection refused by 10.0.0.7".into()));
        }

        let mut items = vec![
            RetrievedItem::new("a dog running in a field", "https://example.com/1.jpg", 0.91),
            RetrievedItem::new("a puppy on grass", "https://example.com/2.jpg", 0.87),
            RetrievedItem::new("two dogs at the beach", "https://example.com/3.jpg", 0.52),
        ];
        items.truncate(top_k);
        Ok(items)
    }

    async fn health_check(&self) -> RagResult<()> {
        Ok(())
    }
}

struct FakeGenerator(Arc<Calls>);

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> RagResult<String> {
        self.0.generate.fetch_add(1, Ordering::SeqCst);
        let query = prompt.rsplit("Query: ").next().unwrap_or_default();
        Ok(format!("Respuesta sobre {}", query.trim_end_matches("\nAnswer:")))
    }
}

fn app_with(available: bool, config: SearchConfig) -> (axum::Router, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let service = RagService::new(RagContext {
        embedder: Arc::new(FakeEmbedder(Arc::clone(&calls))),
        captioner: Arc::new(FakeCaptioner(Arc::clone(&calls))),
        retriever: Arc::new(FakeRetriever { available }),
        prompt_builder: PromptBuilder::default(),
        generator: Arc::new(FakeGenerator(Arc::clone(&calls))),
    })
    .with_config(config);

    (handlers::router(Arc::new(service)), calls)
}

fn app(available: bool) -> (axum::Router, Arc<Calls>) {
    app_with(available, SearchConfig::default())
}

// ===== Tests =====

#[tokio::test]
async fn test_text_search_returns_200() {
    let (app, calls) = app(true);

    let request = multipart_request(vec![
        Part::Text("query", "a dog playing in the park"),
        Part::Text("top_k", "2"),
    ]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["answer"], "Respuesta sobre a dog playing in the park");

    let items = body["retrieved_items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["caption"], "a dog running in a field");
    assert_eq!(items[0]["url"], "https://example.com/1.jpg");
    assert_eq!(items[1]["caption"], "a puppy on grass");

    assert_eq!(calls.caption.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_image_search_uses_caption_as_query_text() {
    let (app, calls) = app(true);

    let request = multipart_request(vec![Part::File("image", "square.png", png_bytes())]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: SearchResponse = json_body(response.into_body()).await;
    assert_eq!(body.answer, "Respuesta sobre a red square");
    assert_eq!(body.retrieved_items.len(), 3);
    assert_eq!(calls.caption.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_query_returns_400_without_running_pipeline() {
    let (app, calls) = app(true);

    let response = app.oneshot(multipart_request(vec![])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "INVALID_QUERY");
    assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
    assert_eq!(calls.generate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_text_and_image_together_returns_400() {
    let (app, calls) = app(true);

    let request = multipart_request(vec![
        Part::Text("query", "a dog"),
        Part::File("image", "square.png", png_bytes()),
    ]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecodable_image_returns_400() {
    let (app, _) = app(true);

    let request = multipart_request(vec![Part::File("image", "notes.txt", b"plain text".to_vec())]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_top_k_returns_400() {
    for top_k in ["0", "abc", "51"] {
        let (app, _) = app(true);

        let request = multipart_request(vec![Part::Text("query", "a dog"), Part::Text("top_k", top_k)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "top_k = {top_k}");
    }
}

#[tokio::test]
async fn test_index_unavailable_returns_503_without_detail() {
    let (app, calls) = app(false);

    let request = multipart_request(vec![Part::Text("query", "a dog")]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "INDEX_UNAVAILABLE");
    assert!(!body["message"].as_str().unwrap().contains("10.0.0.7"));
    assert_eq!(calls.generate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_upload_returns_413() {
    let (app, calls) = app_with(
        true,
        SearchConfig {
            max_upload_bytes: 64,
            ..SearchConfig::default()
        },
    );

    let request = multipart_request(vec![Part::File("image", "big.bin", vec![0u8; 4096])]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(calls.embed.load(Ordering::SeqCst), 0);
}
