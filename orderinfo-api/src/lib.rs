//! Order Info API - Ingestion and Read Service
//!
//! This crate wires the order ingestion pipeline and the HTTP read gateway
//! around one shared in-memory cache and one durable PostgreSQL store.
//!
//! - `ingest`: event sources (NATS JetStream, in-process channel) and the
//!   write-through pipeline
//! - `routes`: `GET /orders/{id}`, health checks, metrics
//! - `db`: PostgreSQL order store over a deadpool connection pool
//! - `telemetry`: structured logging and Prometheus metrics

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod ingest;
mod macros;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, StreamConfig};
pub use db::{DbConfig, PgOrderStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use ingest::{
    ChannelEventSource, EventSource, InboundEvent, IngestOutcome, IngestPipeline, IngestSnapshot,
    NatsEventSource, NatsOrderPublisher,
};
pub use routes::{create_router, RouterOptions};
pub use services::OrderReadService;
pub use state::AppState;
