//! Read-through access to the order cache.
//!
//! Reads consult the cache first and fall back to the durable store on a
//! miss, backfilling the cache with whatever the store returned.

use std::sync::Arc;

use orderinfo_core::{Order, StoreResult};

use super::order_cache::OrderCache;
use super::read::CacheRead;
use crate::OrderStore;

/// Read-through cache over an [`OrderStore`].
#[derive(Clone)]
pub struct ReadThroughCache {
    /// The in-memory cache.
    cache: Arc<OrderCache>,
    /// The durable store consulted on a miss.
    store: Arc<dyn OrderStore>,
}

impl ReadThroughCache {
    /// Create a new read-through cache.
    pub fn new(cache: Arc<OrderCache>, store: Arc<dyn OrderStore>) -> Self {
        Self { cache, store }
    }

    /// Get a reference to the cache.
    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Get an order from the cache, falling back to the store on a miss.
    ///
    /// Returns [`orderinfo_core::StoreError::NotFound`] when neither holds the
    /// identifier. Store failures are returned as-is and leave the cache
    /// untouched.
    pub async fn get(&self, order_uid: &str) -> StoreResult<CacheRead<Arc<Order>>> {
        if let Some(read) = self.cache.get(order_uid) {
            return Ok(read);
        }
        self.fetch_and_cache(order_uid).await
    }

    /// Fetch from the store and update the cache, regardless of what the
    /// cache currently holds.
    pub async fn fetch_and_cache(&self, order_uid: &str) -> StoreResult<CacheRead<Arc<Order>>> {
        let order = Arc::new(self.store.get(order_uid).await?);
        self.cache.set_shared(Arc::clone(&order));
        Ok(CacheRead::from_storage(order))
    }

    /// Put an order into the cache.
    ///
    /// Called after the order has been persisted.
    pub fn put(&self, order: Order) {
        self.cache.set(order);
    }
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryOrderStore, OrderUidStream, PutOutcome};
    use async_trait::async_trait;
    use orderinfo_core::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper counting `get` calls.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryOrderStore,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl OrderStore for CountingStore {
        async fn put(&self, order: &Order) -> StoreResult<PutOutcome> {
            self.inner.put(order).await
        }

        async fn get(&self, order_uid: &str) -> StoreResult<Order> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(order_uid).await
        }

        async fn list_order_uids(&self) -> StoreResult<OrderUidStream> {
            self.inner.list_order_uids().await
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn order(uid: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_miss_backfills_and_second_read_hits_cache() {
        let store = Arc::new(CountingStore::default());
        store.put(&order("A1")).await.unwrap();
        let cache = Arc::new(OrderCache::new());
        let reads = ReadThroughCache::new(cache.clone(), store.clone());

        let first = reads.get("A1").await.unwrap();
        assert!(first.was_cache_miss());
        assert!(cache.contains("A1"));

        let second = reads.get("A1").await.unwrap();
        assert!(second.was_cache_hit());
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
        assert_eq!(*first.value(), *second.value());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_and_not_cached() {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(OrderCache::new());
        let reads = ReadThroughCache::new(cache.clone(), store);

        let err = reads.get("B9").await.unwrap_err();
        assert_eq!(err, StoreError::not_found("B9"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_put_serves_without_store() {
        let store = Arc::new(CountingStore::default());
        let reads = ReadThroughCache::new(Arc::new(OrderCache::new()), store.clone());

        reads.put(order("A1"));
        let read = reads.get("A1").await.unwrap();
        assert!(read.was_cache_hit());
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_and_cache_overwrites_entry() {
        let store = Arc::new(CountingStore::default());
        store.put(&order("A1")).await.unwrap();
        let reads = ReadThroughCache::new(Arc::new(OrderCache::new()), store);

        let mut stale = order("A1");
        stale.track_number = "STALE".to_string();
        reads.put(stale);

        let read = reads.fetch_and_cache("A1").await.unwrap();
        assert_eq!(read.value().track_number, "WBILMTESTTRACK");
        assert_eq!(
            reads.cache().peek("A1").unwrap().value().track_number,
            "WBILMTESTTRACK"
        );
    }
}
