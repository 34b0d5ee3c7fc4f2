//! Request metrics middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lendscope_common::metrics::RequestMetrics;

/// Record count and latency for every request, labeled by route template
pub async fn track_requests(request: Request, next: Next) -> Response {
    // Route template over raw path so per-id URLs share one series
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint);
    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}
