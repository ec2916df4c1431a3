//! Shared application state for Axum routers.

use std::sync::Arc;

use orderinfo_storage::{OrderCache, OrderStore, ReadThroughCache};

use crate::services::OrderReadService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Read gateway (cache first, store on miss).
    pub orders: OrderReadService,
    /// Durable store, used directly by readiness checks.
    pub store: Arc<dyn OrderStore>,
    /// The process-wide order cache.
    pub cache: Arc<OrderCache>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build state around one cache and one store.
    pub fn new(cache: Arc<OrderCache>, store: Arc<dyn OrderStore>) -> Self {
        let reads = ReadThroughCache::new(cache.clone(), store.clone());
        Self {
            orders: OrderReadService::new(reads),
            store,
            cache,
            start_time: std::time::Instant::now(),
        }
    }

    /// Read-through handle sharing this state's cache and store.
    pub fn reads(&self) -> ReadThroughCache {
        self.orders.reads().clone()
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(OrderReadService, orders);
crate::impl_from_ref!(Arc<dyn OrderStore>, store);
crate::impl_from_ref!(Arc<OrderCache>, cache);
crate::impl_from_ref!(std::time::Instant, start_time);
