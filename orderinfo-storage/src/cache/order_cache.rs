//! In-memory order cache keyed by order identifier.

use orderinfo_core::{Order, OrderUid};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::read::CacheRead;
use super::stats::CacheStats;

/// In-memory mapping from order identifier to the full aggregate.
///
/// Readers share the lock; `set` takes it exclusively only for the map
/// insert. A poisoned lock is recovered, since every critical section leaves
/// the map consistent.
#[derive(Debug, Default)]
pub struct OrderCache {
    entries: RwLock<HashMap<OrderUid, Arc<Order>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl OrderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for the order's identifier.
    pub fn set(&self, order: Order) {
        self.set_shared(Arc::new(order));
    }

    /// Insert or overwrite with an already shared aggregate.
    pub fn set_shared(&self, order: Arc<Order>) {
        let key = order.order_uid.clone();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, order);
    }

    /// Look up an order, recording a hit or miss.
    pub fn get(&self, order_uid: &str) -> Option<CacheRead<Arc<Order>>> {
        let found = self.peek(order_uid);
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Look up an order without touching the hit/miss counters.
    pub fn peek(&self, order_uid: &str) -> Option<CacheRead<Arc<Order>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_uid)
            .map(|order| CacheRead::from_cache(Arc::clone(order)))
    }

    /// Whether an entry exists for the identifier.
    pub fn contains(&self, order_uid: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(order_uid)
    }

    /// Number of cached orders.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of usage statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(uid: &str, track: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: track.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_then_get() {
        let cache = OrderCache::new();
        cache.set(order("A1", "T1"));

        let read = cache.get("A1").expect("cached");
        assert!(read.was_cache_hit());
        assert_eq!(read.value().track_number, "T1");
        assert!(cache.contains("A1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = OrderCache::new();
        cache.set(order("A1", "T1"));
        cache.set(order("A1", "T2"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("A1").unwrap().value().track_number, "T2");
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = OrderCache::new();
        cache.set(order("A1", "T1"));

        assert!(cache.get("A1").is_some());
        assert!(cache.get("B9").is_none());
        assert!(cache.get("B9").is_none());
        // peek does not count
        assert!(cache.peek("A1").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_reader_keeps_old_aggregate_after_overwrite() {
        let cache = OrderCache::new();
        cache.set(order("A1", "T1"));
        let held = cache.get("A1").unwrap().into_value();

        cache.set(order("A1", "T2"));
        assert_eq!(held.track_number, "T1");
    }

    #[test]
    fn test_concurrent_reads_never_see_torn_aggregate() {
        let cache = Arc::new(OrderCache::new());
        let make = |n: usize| Order {
            order_uid: "A1".to_string(),
            track_number: format!("T{n}"),
            customer_id: format!("T{n}"),
            items: vec![Default::default(); n % 4],
            ..Default::default()
        };
        cache.set(make(0));

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for n in 1..500 {
                    cache.set(make(n));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let read = cache.get("A1").expect("always present");
                        let order = read.value();
                        assert_eq!(order.track_number, order.customer_id);
                        let n: usize = order.track_number[1..].parse().unwrap();
                        assert_eq!(order.items.len(), n % 4);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
