//! Order Info Core - Order Aggregate Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains the order aggregate, identifier helpers and the
//! error taxonomy shared by the store, the cache and the API layer.

use chrono::{DateTime, Utc};

mod entities;
mod error;

pub use entities::{Delivery, Item, Order, Payment, TIMESTAMP_SUBSEC_DIGITS};
pub use error::{
    ConfigError, EventStreamError, OrderInfoError, OrderInfoResult, StoreError, StoreResult,
    ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Order identifier as issued by the producer. Opaque, compared byte-wise.
pub type OrderUid = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Returns true when an identifier is empty or consists only of whitespace.
///
/// Such identifiers are rejected on ingestion and answered with a bad
/// request on the read path.
pub fn is_blank_uid(order_uid: &str) -> bool {
    order_uid.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_uid() {
        assert!(is_blank_uid(""));
        assert!(is_blank_uid("  \t"));
        assert!(!is_blank_uid("A1"));
        assert!(!is_blank_uid(" A1 "));
    }
}
