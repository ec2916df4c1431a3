//! Order Read Service
//!
//! Point lookups by order identifier: cache first, durable store on a miss,
//! backfilling the cache with what the store returned.

use orderinfo_core::{is_blank_uid, Order};
use orderinfo_storage::ReadThroughCache;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

/// Read gateway over the shared cache and store.
#[derive(Debug, Clone)]
pub struct OrderReadService {
    reads: ReadThroughCache,
}

impl OrderReadService {
    pub fn new(reads: ReadThroughCache) -> Self {
        Self { reads }
    }

    /// The cache and store this service reads through.
    pub fn reads(&self) -> &ReadThroughCache {
        &self.reads
    }

    /// Look up one order.
    ///
    /// # Errors
    /// - `MissingField` when the identifier is empty or whitespace
    /// - `OrderNotFound` when neither the cache nor the store has it
    /// - `InternalError` for any other store failure
    pub async fn get_order(&self, order_uid: &str) -> ApiResult<Arc<Order>> {
        if is_blank_uid(order_uid) {
            return Err(ApiError::missing_field("order_uid"));
        }

        let read = self.reads.get(order_uid).await;

        if let Some(metrics) = metrics() {
            metrics.record_cache_lookup(read.as_ref().is_ok_and(|r| r.was_cache_hit()));
            metrics.record_cache_stats(&self.reads.cache().stats());
        }
        let read = read?;
        tracing::debug!(
            order_uid = %order_uid,
            cache_hit = read.was_cache_hit(),
            "Order lookup"
        );

        Ok(read.into_value())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use orderinfo_storage::{OrderCache, OrderStore};
    use orderinfo_test_utils::fixtures::{order_with_items, sample_order};
    use orderinfo_test_utils::{CountingStore, FailingStore};

    fn service_over(store: Arc<dyn OrderStore>) -> OrderReadService {
        OrderReadService::new(ReadThroughCache::new(Arc::new(OrderCache::new()), store))
    }

    #[tokio::test]
    async fn test_blank_id_is_bad_request() {
        let service = service_over(Arc::new(CountingStore::with_orders([sample_order()])));
        for id in ["", "   "] {
            let err = service.get_order(id).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::MissingField);
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let service = service_over(Arc::new(CountingStore::new()));
        let err = service.get_order("B9").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }

    #[tokio::test]
    async fn test_miss_backfills_cache() {
        let order = order_with_items("A1", 3);
        let store = Arc::new(CountingStore::with_orders([order.clone()]));
        let service = service_over(store.clone());

        let first = service.get_order("A1").await.unwrap();
        let second = service.get_order("A1").await.unwrap();

        assert_eq!(first.as_ref(), &order);
        assert_eq!(second.as_ref(), &order);
        assert_eq!(store.get_calls(), 1);
        assert!(service.reads().cache().contains("A1"));
    }

    #[tokio::test]
    async fn test_store_failure_is_generic_internal_error() {
        let store = Arc::new(FailingStore::with_orders([order_with_items("A1", 1)]));
        store.fail_get("A1");
        let service = service_over(store);

        let err = service.get_order("A1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("injected"));
    }
}
