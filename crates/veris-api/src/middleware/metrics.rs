//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) recorded in
//! middleware against a dedicated Prometheus registry, exposed at
//! `/metrics` in text exposition format.
//!
//! Route labels use the matched route template (`/v1/assessments/{id}`),
//! not the raw path, so label cardinality stays bounded.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}

impl ApiMetrics {
    /// Create a metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("veris_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "veris_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "veris_http_errors_total",
                "Total HTTP errors (4xx and 5xx)",
            ),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
            }),
        }
    }

    /// Record one finished request.
    fn record(&self, method: &str, path: &str, status: u16, elapsed_secs: f64) {
        let status = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(elapsed_secs);
        if status.starts_with('4') || status.starts_with('5') {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, status.as_str()])
                .inc();
        }
    }

    /// Gather and encode all metrics in Prometheus text exposition format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buffer).map_err(|e| e.to_string())
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Axum middleware recording request metrics.
pub async fn metrics_middleware(
    Extension(metrics): Extension<ApiMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    metrics.record(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_encodes() {
        let metrics = ApiMetrics::new();
        metrics.record("GET", "/v1/compliance/config", 200, 0.012);
        metrics.record("POST", "/v1/assessments", 422, 0.004);

        let body = metrics.gather_and_encode().unwrap();
        assert!(body.contains("veris_http_requests_total"));
        assert!(body.contains("veris_http_errors_total"));
        assert!(body.contains("veris_http_request_duration_seconds"));
    }

    #[test]
    fn errors_counted_for_4xx_and_5xx_only() {
        let metrics = ApiMetrics::new();
        metrics.record("GET", "/a", 200, 0.01);
        metrics.record("GET", "/a", 404, 0.01);
        metrics.record("GET", "/a", 500, 0.01);

        let body = metrics.gather_and_encode().unwrap();
        // 200 appears in requests but not errors.
        assert!(body.contains("veris_http_requests_total{method=\"GET\",path=\"/a\",status=\"200\"} 1"));
        assert!(!body.contains("veris_http_errors_total{method=\"GET\",path=\"/a\",status=\"200\"}"));
        assert!(body.contains("veris_http_errors_total{method=\"GET\",path=\"/a\",status=\"404\"} 1"));
        assert!(body.contains("veris_http_errors_total{method=\"GET\",path=\"/a\",status=\"500\"} 1"));
    }
}
