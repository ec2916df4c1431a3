//! Write-through read cache for order aggregates.
//!
//! The ingestion path writes every persisted order into an [`OrderCache`];
//! the read path consults it first and falls back to the durable store on a
//! miss through [`ReadThroughCache`]. At startup [`warm_up`] rebuilds the
//! cache from the store's full order set.
//!
//! Entries are held as `Arc<Order>`, so a reader always receives a complete
//! aggregate and never observes a partially written one. There is no expiry
//! and no eviction: orders are immutable once created.
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(OrderCache::new());
//! let report = warm_up(&cache, store.as_ref()).await;
//!
//! let reads = ReadThroughCache::new(cache.clone(), store.clone());
//! let read = reads.get("b563feb7b2b84b6test").await?;
//! if read.was_cache_miss() {
//!     tracing::debug!("backfilled from store");
//! }
//! ```

pub mod order_cache;
pub mod read;
pub mod read_through;
pub mod stats;
pub mod warmup;

pub use order_cache::OrderCache;
pub use read::CacheRead;
pub use read_through::ReadThroughCache;
pub use stats::CacheStats;
pub use warmup::{warm_up, WarmupReport};
