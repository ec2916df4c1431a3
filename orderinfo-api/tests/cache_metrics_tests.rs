//! Cache gauge tests.
//!
//! The Prometheus registry is process-global, so every gauge assertion lives
//! in one test in its own test binary.

use std::sync::Arc;

use orderinfo_api::telemetry::metrics;
use orderinfo_api::{IngestOutcome, IngestPipeline, OrderReadService};
use orderinfo_storage::{OrderCache, OrderStore, ReadThroughCache};
use orderinfo_test_utils::fixtures::{order_payload, order_with_items};
use orderinfo_test_utils::InMemoryOrderStore;

#[tokio::test]
async fn test_cache_gauges_follow_ingestion_and_reads() {
    let metrics = metrics().expect("metrics registered");
    metrics.cache_entries.set(0.0);
    metrics.cache_hit_ratio.set(0.0);

    // An order stored before this cache existed, so its duplicate is backfilled.
    let memory = Arc::new(InMemoryOrderStore::with_orders([order_with_items("OLD", 1)]));
    let store: Arc<dyn OrderStore> = memory;
    let cache = Arc::new(OrderCache::new());
    let reads = ReadThroughCache::new(cache.clone(), store);
    let pipeline = IngestPipeline::new(reads.clone());

    for uid in ["A1", "A2", "A3"] {
        let outcome = pipeline
            .handle_payload(&order_payload(&order_with_items(uid, 2)))
            .await;
        assert!(matches!(outcome, IngestOutcome::Cached { .. }));
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(metrics.cache_entries.get(), 3.0);

    let outcome = pipeline
        .handle_payload(&order_payload(&order_with_items("OLD", 3)))
        .await;
    assert!(matches!(outcome, IngestOutcome::Duplicate { .. }));
    assert_eq!(cache.len(), 4);
    assert_eq!(metrics.cache_entries.get(), 4.0);

    // Three hits and one miss.
    let service = OrderReadService::new(reads);
    for uid in ["A1", "A2", "A3"] {
        service.get_order(uid).await.expect("cached order");
    }
    assert!(service.get_order("B9").await.is_err());

    assert_eq!(cache.stats().hits, 3);
    assert_eq!(cache.stats().misses, 1);
    assert!((metrics.cache_hit_ratio.get() - 0.75).abs() < f64::EPSILON);
}
