//! Constants for the Order Info API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default graceful shutdown bound in seconds
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

// ============================================================================
// EVENT STREAM
// ============================================================================

/// Default broker address
pub const DEFAULT_STREAM_BROKER: &str = "nats://localhost:4222";

/// Default subject orders are published on
pub const DEFAULT_STREAM_TOPIC: &str = "orders";

/// Default stream capturing the subject
pub const DEFAULT_STREAM_NAME: &str = "ORDERS";

/// Default durable consumer name
pub const DEFAULT_STREAM_GROUP: &str = "order-service";

// ============================================================================
// DATABASE
// ============================================================================

/// Default database name
pub const DEFAULT_DB_NAME: &str = "order_db";

/// Default database user
pub const DEFAULT_DB_USER: &str = "order_user";

/// Default database password
pub const DEFAULT_DB_PASSWORD: &str = "order_pass";

/// Default maximum pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default connection timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Default service name reported in logs
pub const DEFAULT_SERVICE_NAME: &str = "orderinfo-api";

/// Default log filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "orderinfo_api=debug,orderinfo_storage=info,info";
