//! Order Info Telemetry - Observability Infrastructure
//!
//! Provides structured logging and Prometheus metrics for the service.
//! All features work standalone without external dependencies.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, OrderInfoMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
