//! Observability utilities for the search service.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Search pipeline metrics (stage durations, outcomes, retrieval sizes)
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, RagMetrics};
//!
//! init_metrics()?;
//!
//! RagMetrics::record_search("text", "ok");
//!
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod middleware;
pub mod rag;

pub use middleware::metrics_middleware;
pub use rag::{RagMetrics, StageTimer};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at application startup; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_histogram;

    // HTTP metrics
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    // Search pipeline metrics
    describe_histogram!(
        "rag_stage_duration_seconds",
        "Search pipeline stage duration in seconds"
    );
    describe_counter!(
        "rag_searches_total",
        "Total searches by query modality and outcome"
    );
    describe_histogram!("rag_retrieved_items", "Items returned per retrieval");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_handler_renders_after_init() {
        init_metrics().unwrap();
        RagMetrics::record_search("text", "ok");

        let body = metrics_handler().await;
        assert!(body.contains("rag_searches_total"));
    }
}
