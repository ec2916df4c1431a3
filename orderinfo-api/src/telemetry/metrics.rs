//! Prometheus Metrics Definitions
//!
//! Defines all order info metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use orderinfo_storage::CacheStats;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<OrderInfoMetrics>> = Lazy::new(OrderInfoMetrics::new);

/// Registered metrics, or None when registration failed.
///
/// Registration failure is logged once by the caller that first observes it;
/// recording sites simply skip.
pub fn metrics() -> Option<&'static OrderInfoMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all order info metrics.
#[derive(Clone)]
pub struct OrderInfoMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Store operation counter - labels: operation, status
    pub store_operations_total: CounterVec,

    /// Store operation duration histogram - labels: operation
    pub store_operation_duration_seconds: HistogramVec,

    /// Ingested message counter - labels: outcome
    pub ingest_messages_total: CounterVec,

    /// Cache lookup counter - labels: result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Current number of cached orders
    pub cache_entries: Gauge,

    /// Share of cache lookups served without the store
    pub cache_hit_ratio: Gauge,
}

impl OrderInfoMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "orderinfo_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "orderinfo_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            store_operations_total: register_counter_vec!(
                "orderinfo_store_operations_total",
                "Total number of durable store operations",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register store_operations_total: {}", e)))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "orderinfo_store_operation_duration_seconds",
                "Durable store operation duration in seconds",
                &["operation"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register store_operation_duration_seconds: {}", e)))?,

            ingest_messages_total: register_counter_vec!(
                "orderinfo_ingest_messages_total",
                "Total event stream messages by ingestion outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register ingest_messages_total: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "orderinfo_cache_lookups_total",
                "Total read cache lookups",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            cache_entries: register_gauge!(
                "orderinfo_cache_entries",
                "Current number of cached orders"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_entries: {}", e)))?,

            cache_hit_ratio: register_gauge!(
                "orderinfo_cache_hit_ratio",
                "Fraction of cache lookups that were hits"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_hit_ratio: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a durable store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record the outcome of one ingested message.
    pub fn record_ingest(&self, outcome: &str) {
        self.ingest_messages_total.with_label_values(&[outcome]).inc();
    }

    /// Record a cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    /// Publish a cache usage snapshot.
    pub fn record_cache_stats(&self, stats: &CacheStats) {
        self.cache_entries.set(stats.entry_count as f64);
        self.cache_hit_ratio.set(stats.hit_rate());
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        // Force initialization
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        metrics.record_http_request("GET", "/orders/:id", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_record_store_operation() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        metrics.record_store_operation("put", true, 0.005);
        metrics.record_store_operation("get", false, 0.010);
        Ok(())
    }

    #[test]
    fn test_ingest_and_cache_metrics() -> Result<(), String> {
        let metrics = metrics().ok_or("Metrics init failed")?;
        let before = metrics
            .ingest_messages_total
            .with_label_values(&["rejected"])
            .get();
        metrics.record_ingest("rejected");
        let after = metrics
            .ingest_messages_total
            .with_label_values(&["rejected"])
            .get();
        assert!(after >= before + 1.0);

        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        Ok(())
    }
}
