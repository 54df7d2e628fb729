//! Request metrics middleware.
//!
//! Series are labelled by route template, never by raw URI, so the label set
//! stays bounded no matter what clients request.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response, StatusCode},
    middleware::Next,
};
use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Route label for requests that matched no route (404 fallback).
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Records `http_requests_total`, `http_request_duration_seconds` and, for
/// 4xx/5xx responses, `http_requests_errors_total`.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/search", post(search))
///     .layer(axum::middleware::from_fn(metrics_middleware));
/// ```
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let method = request.method().as_str().to_owned();
    let route = route_label(matched_path.as_ref());
    let started = Instant::now();

    let response = next.run(request).await;

    record_request(method, route, response.status(), started.elapsed());
    response
}

fn route_label(matched_path: Option<&MatchedPath>) -> String {
    matched_path.map_or_else(|| UNMATCHED_ROUTE.to_owned(), |path| path.as_str().to_owned())
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

fn record_request(method: String, route: String, status: StatusCode, elapsed: Duration) {
    let code = status.as_str().to_owned();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => route.clone(),
        "status" => code.clone(),
        "status_class" => status_class(status)
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method.clone(),
        "path" => route.clone()
    )
    .record(elapsed.as_secs_f64());

    if status.is_client_error() || status.is_server_error() {
        counter!(
            "http_requests_errors_total",
            "method" => method,
            "path" => route,
            "status" => code
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/items/{id}", get(|| async { "item" }))
            .layer(axum::middleware::from_fn(metrics_middleware))
    }

    /// Drive `uris` through the app against a private recorder and return
    /// the rendered exposition.
    fn render_after(uris: &[&str]) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                for uri in uris {
                    let request = Request::builder().uri(*uri).body(Body::empty()).unwrap();
                    app().oneshot(request).await.unwrap();
                }
            })
        });

        handle.render()
    }

    fn series<'a>(rendered: &'a str, name: &str) -> Vec<&'a str> {
        let prefix = format!("{}{{", name);
        rendered
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .collect()
    }

    #[tokio::test]
    async fn test_middleware_passes_response_through() {
        let response = app()
            .oneshot(Request::builder().uri("/items/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_matched_requests_use_route_template() {
        let rendered = render_after(&["/items/1", "/items/2"]);

        let requests = series(&rendered, "http_requests_total");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains(r#"path="/items/{id}""#));
        assert!(requests[0].ends_with(" 2"));
    }

    #[test]
    fn test_unknown_paths_share_one_series() {
        let rendered = render_after(&["/wp-admin", "/.env"]);

        let requests = series(&rendered, "http_requests_total");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains(r#"path="unmatched""#));
        assert!(requests[0].contains(r#"status="404""#));
        assert!(requests[0].ends_with(" 2"));

        assert_eq!(series(&rendered, "http_requests_errors_total").len(), 1);
        assert!(!rendered.contains("wp-admin"));
        assert!(!rendered.contains(".env"));
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(StatusCode::OK), "2xx");
        assert_eq!(status_class(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_class(StatusCode::SERVICE_UNAVAILABLE), "5xx");
    }
}
