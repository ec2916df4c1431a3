//! Order Info Storage - Store Trait and In-Memory Implementation
//!
//! Defines the durable store abstraction for order aggregates and the
//! in-memory read cache that sits in front of it.
//! The PostgreSQL implementation lives in orderinfo-api.

pub mod cache;

pub use cache::{
    warm_up, CacheRead, CacheStats, OrderCache, ReadThroughCache, WarmupReport,
};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use orderinfo_core::{Order, OrderUid, StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Result of persisting an order aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The aggregate was written for the first time.
    Inserted,
    /// An aggregate with the same identifier already existed; nothing was written.
    AlreadyPresent,
}

/// Lazy, finite sequence of stored order identifiers.
pub type OrderUidStream = BoxStream<'static, StoreResult<OrderUid>>;

/// Durable store for order aggregates.
///
/// Implementations must write the root record and all of its children
/// atomically, and must never duplicate child rows when the same identifier
/// is written twice.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the full aggregate. Succeeds when the identifier already exists.
    async fn put(&self, order: &Order) -> StoreResult<PutOutcome>;

    /// Get the fully assembled aggregate, or [`StoreError::NotFound`].
    async fn get(&self, order_uid: &str) -> StoreResult<Order>;

    /// Enumerate every stored identifier. Each call starts a fresh sequence.
    async fn list_order_uids(&self) -> StoreResult<OrderUidStream>;

    /// Check connectivity.
    async fn ping(&self) -> StoreResult<()>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory order store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderUid, Order>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given orders.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        Self {
            orders: RwLock::new(map),
        }
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no orders.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all stored orders.
    pub fn clear(&self) {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn put(&self, order: &Order) -> StoreResult<PutOutcome> {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        if orders.contains_key(&order.order_uid) {
            return Ok(PutOutcome::AlreadyPresent);
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(PutOutcome::Inserted)
    }

    async fn get(&self, order_uid: &str) -> StoreResult<Order> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders
            .get(order_uid)
            .cloned()
            .ok_or_else(|| StoreError::not_found(order_uid))
    }

    async fn list_order_uids(&self) -> StoreResult<OrderUidStream> {
        let mut uids: Vec<OrderUid> = self
            .orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        uids.sort();
        Ok(stream::iter(uids.into_iter().map(Ok)).boxed())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Writing the same identifier any number of times keeps exactly one
        /// aggregate, equal to the first one written.
        #[test]
        fn prop_repeated_put_keeps_first_write(
            uid in "[A-Za-z0-9]{1,16}",
            tracks in proptest::collection::vec("[A-Z]{1,8}", 1..6),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryOrderStore::new();
                for track in &tracks {
                    let order = Order {
                        order_uid: uid.clone(),
                        track_number: track.clone(),
                        ..Default::default()
                    };
                    store.put(&order).await.unwrap();
                }
                prop_assert_eq!(store.len(), 1);
                prop_assert_eq!(&store.get(&uid).await.unwrap().track_number, &tracks[0]);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
