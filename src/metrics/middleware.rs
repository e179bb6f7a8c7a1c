//! HTTP metrics middleware.
//!
//! Wraps the request lifecycle: active-requests gauge up on entry, request
//! size observed when declared, then count/duration/response size recorded
//! after the handler returns. The gauge decrement is an RAII guard drop,
//! so it runs on normal returns, error responses, panics, and cancelled
//! requests alike.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::series::ServiceMetrics;

/// Record HTTP metrics around the downstream handler.
///
/// The endpoint label is the matched route template (`/api/users/{id}`),
/// not the interpolated path, to keep series cardinality bounded. The raw
/// path is only used when no template matched.
pub async fn metrics_middleware(
    State(metrics): State<ServiceMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let service = metrics.service().to_string();

    let _active = metrics.track_active_request();

    if let Some(size) = content_length(request.headers()) {
        metrics
            .http_request_size_bytes
            .with_label_values(&[&method, &endpoint, &service])
            .observe(size as f64);
    }

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    metrics
        .http_requests_total
        .with_label_values(&[&method, &endpoint, &status, &service])
        .inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(&[&method, &endpoint, &status, &service])
        .observe(duration);
    if let Some(size) = response_size(&response) {
        metrics
            .http_response_size_bytes
            .with_label_values(&[&method, &endpoint, &status, &service])
            .observe(size as f64);
    }

    response
}

/// Size of an outbound response.
///
/// In-process responses carry no `Content-Length` header; hyper adds it at
/// wire serialization. The body's size hint is exact for every fixed body
/// (`String`, `Json`, bytes), so read that first and fall back to the
/// header only for streaming bodies that declared a length themselves.
fn response_size(response: &Response) -> Option<u64> {
    http_body::Body::size_hint(response.body())
        .exact()
        .filter(|size| *size > 0)
        .or_else(|| content_length(response.headers()))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|size| *size > 0)
}
