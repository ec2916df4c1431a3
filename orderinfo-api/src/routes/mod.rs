//! REST API Routes Module
//!
//! Includes:
//! - Order lookup by identifier
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics

pub mod health;
pub mod order;

use std::time::Duration;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::timeout::TimeoutLayer;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, TelemetryConfig};

// Re-export route creation functions for convenience
pub use health::create_router as health_router;
pub use order::create_router as order_router;

/// Router-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterOptions {
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Serve GET /metrics
    pub metrics_enabled: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS),
            metrics_enabled: true,
        }
    }
}

impl RouterOptions {
    pub fn from_config(api: &ApiConfig, telemetry: &TelemetryConfig) -> Self {
        Self {
            request_timeout: api.request_timeout,
            metrics_enabled: telemetry.metrics_enabled,
        }
    }
}

/// Fallback for paths no route matches.
async fn route_not_found() -> ApiError {
    ApiError::route_not_found()
}

/// Build the complete router.
///
/// # Middleware Order (outer to inner)
/// 1. Observability - tracing and metrics
/// 2. Timeout - per-request deadline
pub fn create_router(state: AppState, options: RouterOptions) -> Router {
    let mut router = Router::new()
        .merge(order::create_router())
        .nest("/health", health::create_router());

    if options.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .fallback(route_not_found)
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(from_fn(observability_middleware))
        .with_state(state)
}
