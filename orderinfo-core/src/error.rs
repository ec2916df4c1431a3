//! Error types for order info operations

use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },

    #[error("Store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Query failed during {operation}: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Transaction failed for order {order_uid}: {reason}")]
    TransactionFailed { order_uid: String, reason: String },

    #[error("Stored aggregate for order {order_uid} is incomplete: {reason}")]
    IncompleteAggregate { order_uid: String, reason: String },
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        Self::NotFound {
            order_uid: order_uid.into(),
        }
    }

    /// Shorthand for [`StoreError::QueryFailed`].
    pub fn query_failed(operation: &str, reason: impl ToString) -> Self {
        Self::QueryFailed {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the order simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Inbound payload validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed order payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Event stream errors. Every variant is fatal to the ingestion task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventStreamError {
    #[error("Failed to connect to event stream at {brokers}: {reason}")]
    Connect { brokers: String, reason: String },

    #[error("Failed to bind consumer {group} to {topic}: {reason}")]
    Subscribe {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("Event stream read failed: {reason}")]
    Read { reason: String },

    #[error("Failed to acknowledge message: {reason}")]
    Ack { reason: String },

    #[error("Failed to publish message: {reason}")]
    Publish { reason: String },

    #[error("Event stream closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for order info operations.
#[derive(Debug, Clone, Error)]
pub enum OrderInfoError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event stream error: {0}")]
    Stream(#[from] EventStreamError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for order info operations.
pub type OrderInfoResult<T> = Result<T, OrderInfoError>;

// =============================================================================
// TESTS
// =============================================================================
