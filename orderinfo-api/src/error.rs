//! API Error Types
//!
//! Every failure a handler can return is an [`ApiError`]: a stable
//! [`ErrorCode`] plus a message, rendered as a JSON body with the status the
//! code maps to. Store failures other than "not found" are logged here in full
//! and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orderinfo_core::{ConfigError, EventStreamError, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Machine-readable error category, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400
    /// Configuration or input that cannot be used
    InvalidInput,
    /// Order identifier absent or blank
    MissingField,

    // 404
    /// No order with the requested identifier
    OrderNotFound,
    /// No route matches the request path
    RouteNotFound,

    // 500 / 503
    /// Unexpected failure; detail is only in the logs
    InternalError,
    /// Database pool could not be built
    DatabaseError,
    /// A dependency (event stream) is not reachable
    ServiceUnavailable,
}

impl ErrorCode {
    /// HTTP status this code is answered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,
            ErrorCode::OrderNotFound | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message used when a caller supplies none.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::RouteNotFound => "Not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// JSON error body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Error with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn order_not_found(order_uid: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::OrderNotFound,
            format!("Order {} not found", order_uid),
        )
    }

    pub fn route_not_found() -> Self {
        Self::from_code(ErrorCode::RouteNotFound)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Only `NotFound` carries information to the client.
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { order_uid } => ApiError::order_not_found(order_uid),
            other => {
                tracing::error!(error = %other, "Store error while serving request");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

/// Startup only.
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(format!("Invalid configuration: {}", err))
    }
}

/// Startup and ingestion exit.
impl From<EventStreamError> for ApiError {
    fn from(err: EventStreamError) -> Self {
        ApiError::service_unavailable(format!("Event stream unavailable: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OrderNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::order_not_found("B9");
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert!(err.message.contains("B9"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::missing_field("order_uid");
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("order_uid"));
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err = ApiError::from(StoreError::not_found("B9"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("B9"));
    }

    #[test]
    fn test_other_store_errors_hide_detail() {
        let err = ApiError::from(StoreError::query_failed("get", "relation \"orders\" does not exist"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");

        let err = ApiError::from(StoreError::Connection {
            reason: "password authentication failed".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("password"));
    }

    #[test]
    fn test_startup_errors_convert() {
        let err = ApiError::from(ConfigError::MissingRequired {
            field: "ORDERS_API_PORT".to_string(),
        });
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("ORDERS_API_PORT"));

        let err = ApiError::from(EventStreamError::Closed);
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
    }

    #[test]
    fn test_error_body_shape() -> Result<(), serde_json::Error> {
        let err = ApiError::order_not_found("B9");
        let json: serde_json::Value = serde_json::to_value(&err)?;

        assert_eq!(json["code"], "ORDER_NOT_FOUND");
        assert_eq!(json.as_object().map(|o| o.len()), Some(2));

        let back: ApiError = serde_json::from_value(json)?;
        assert_eq!(back, err);
        Ok(())
    }
}
