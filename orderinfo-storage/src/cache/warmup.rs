//! Startup cache reconstruction.
//!
//! Enumerates every identifier in the durable store and loads the full
//! aggregate into the cache. Runs once, before ingestion and the HTTP
//! listener start.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use orderinfo_core::OrderUid;

use super::order_cache::OrderCache;
use crate::OrderStore;

/// Outcome of a warm-up run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Orders loaded into the cache.
    pub loaded: u64,
    /// Identifiers whose aggregate could not be fetched.
    pub failed: u64,
    /// False when enumeration stopped early.
    pub completed: bool,
    /// Wall time spent.
    pub elapsed: Duration,
}

/// Populate the cache from the store.
///
/// The identifier list is drained before any aggregate is fetched, so the
/// enumeration never holds a store connection while `get` needs one.
/// A failed fetch for one identifier is logged and skipped. A failure to
/// start or continue the enumeration keeps the identifiers already listed;
/// the caller continues startup either way.
pub async fn warm_up(cache: &OrderCache, store: &dyn OrderStore) -> WarmupReport {
    let started = Instant::now();
    let mut report = WarmupReport::default();

    let (order_uids, completed) = list_all(store).await;
    report.completed = completed;

    for order_uid in order_uids {
        match store.get(&order_uid).await {
            Ok(order) => {
                cache.set_shared(Arc::new(order));
                report.loaded += 1;
            }
            Err(e) => {
                tracing::warn!(order_uid = %order_uid, error = %e, "Skipping order during cache warm-up");
                report.failed += 1;
            }
        }
    }

    report.elapsed = started.elapsed();
    tracing::info!(
        loaded = report.loaded,
        failed = report.failed,
        completed = report.completed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Cache warm-up finished"
    );
    report
}

/// Every identifier the store lists, and whether the listing ran to the end.
async fn list_all(store: &dyn OrderStore) -> (Vec<OrderUid>, bool) {
    let mut uids = match store.list_order_uids().await {
        Ok(uids) => uids,
        Err(e) => {
            tracing::error!(error = %e, "Cache warm-up could not enumerate orders");
            return (Vec::new(), false);
        }
    };

    let mut listed = Vec::new();
    while let Some(next) = uids.next().await {
        match next {
            Ok(order_uid) => listed.push(order_uid),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    listed = listed.len(),
                    "Cache warm-up enumeration failed, keeping partial cache"
                );
                return (listed, false);
            }
        }
    }
    (listed, true)
}
