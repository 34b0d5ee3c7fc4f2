//! Metrics and observability utilities
//!
//! Prometheus-style metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Lendscope metrics
pub const METRICS_PREFIX: &str = "lendscope";

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Indexing metrics
    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents indexed"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_counter!(
        format!("{}_pages_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages that failed extraction or embedding"
    );

    describe_histogram!(
        format!("{}_indexing_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document indexing latency in seconds"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval operations"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_sources_count", METRICS_PREFIX),
        Unit::Count,
        "Number of sources returned from retrieval"
    );

    // Review metrics
    describe_counter!(
        format!("{}_reviews_total", METRICS_PREFIX),
        Unit::Count,
        "Total checklist review runs"
    );

    describe_counter!(
        format!("{}_questions_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions that failed during review"
    );

    describe_histogram!(
        format!("{}_review_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Checklist review latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record indexing metrics
pub fn record_indexing(duration_secs: f64, chunks_created: usize, pages_failed: usize) {
    counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);
    if pages_failed > 0 {
        counter!(format!("{}_pages_failed_total", METRICS_PREFIX)).increment(pages_failed as u64);
    }
    histogram!(format!("{}_indexing_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, path: &str, source_count: usize) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_retrieval_sources_count", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .set(source_count as f64);
}

/// Helper to record review run metrics
pub fn record_review(duration_secs: f64, questions: usize, failed: usize) {
    counter!(format!("{}_reviews_total", METRICS_PREFIX)).increment(1);
    if failed > 0 {
        counter!(format!("{}_questions_failed_total", METRICS_PREFIX)).increment(failed as u64);
    }
    histogram!(
        format!("{}_review_duration_seconds", METRICS_PREFIX),
        "questions" => questions.to_string()
    )
    .record(duration_secs);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/rag/query");
        std::thread::sleep(std::time::Duration::from_millis(1));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
