//! Ingestion Pipeline
//!
//! Drives one sequential consumer over an [`EventSource`]. Each message moves
//! through `received → validated → persisted → cached`; a message that fails
//! a stage is dropped, logged and counted, and the loop continues. Only a
//! stream-level error ends the run early.
//!
//! ```ignore
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let pipeline = IngestPipeline::new(reads.clone());
//!
//! let handle = tokio::spawn(async move {
//!     let mut source = NatsEventSource::connect(&stream_config).await?;
//!     pipeline.run(&mut source, shutdown_rx).await
//! });
//!
//! // Later, trigger shutdown
//! let _ = shutdown_tx.send(true);
//! ```

use orderinfo_core::{EventStreamError, Order, OrderUid};
use orderinfo_storage::{PutOutcome, ReadThroughCache};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::source::{EventSource, InboundEvent};
use crate::telemetry::metrics;

// ============================================================================
// OUTCOMES
// ============================================================================

/// Last stage a message reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Validated,
    Persisted,
    Cached,
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored for the first time and cached.
    Cached { order_uid: OrderUid },
    /// Identifier already stored; the stored aggregate was kept.
    Duplicate { order_uid: OrderUid },
    /// Payload did not decode into a valid order.
    Rejected { reason: String },
    /// The store refused the write.
    PersistFailed { order_uid: OrderUid, reason: String },
}

impl IngestOutcome {
    /// Last stage the message reached.
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Cached { .. } | Self::Duplicate { .. } => IngestStage::Cached,
            Self::PersistFailed { .. } => IngestStage::Validated,
            Self::Rejected { .. } => IngestStage::Received,
        }
    }

    /// Prometheus label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached { .. } => "cached",
            Self::Duplicate { .. } => "duplicate",
            Self::Rejected { .. } => "rejected",
            Self::PersistFailed { .. } => "persist_failed",
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for ingestion activity since startup.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Messages read from the stream
    pub received: AtomicU64,

    /// Messages dropped at validation
    pub rejected: AtomicU64,

    /// Messages dropped because the store write failed
    pub persist_failed: AtomicU64,

    /// Orders stored and cached
    pub cached: AtomicU64,

    /// Messages for identifiers that were already stored
    pub duplicates: AtomicU64,

    /// Acknowledgements the broker did not accept
    pub ack_failures: AtomicU64,
}

impl IngestMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &IngestOutcome) {
        let counter = match outcome {
            IngestOutcome::Cached { .. } => &self.cached,
            IngestOutcome::Duplicate { .. } => &self.duplicates,
            IngestOutcome::Rejected { .. } => &self.rejected,
            IngestOutcome::PersistFailed { .. } => &self.persist_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = metrics() {
            metrics.record_ingest(outcome.label());
        }
    }
}

/// Snapshot of ingestion metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub persist_failed: u64,
    pub cached: u64,
    pub duplicates: u64,
    pub ack_failures: u64,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Write-through ingestion: store first, then cache.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    reads: ReadThroughCache,
    metrics: Arc<IngestMetrics>,
}

impl IngestPipeline {
    /// Create a pipeline writing through the given cache and store.
    pub fn new(reads: ReadThroughCache) -> Self {
        Self {
            reads,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Shared ingestion counters.
    pub fn metrics(&self) -> Arc<IngestMetrics> {
        self.metrics.clone()
    }

    /// Take one payload through every stage.
    pub async fn handle_payload(&self, payload: &[u8]) -> IngestOutcome {
        self.metrics.received.fetch_add(1, Ordering::Relaxed);
        let outcome = self.process(payload).await;
        self.metrics.record(&outcome);
        outcome
    }

    async fn process(&self, payload: &[u8]) -> IngestOutcome {
        let order = match Order::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, bytes = payload.len(), "Dropping invalid order event");
                return IngestOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };
        let order_uid = order.order_uid.clone();

        match self.reads.store().put(&order).await {
            Ok(PutOutcome::Inserted) => {
                self.reads.put(order);
                self.publish_cache_stats();
                tracing::debug!(order_uid = %order_uid, "Order stored and cached");
                IngestOutcome::Cached { order_uid }
            }
            Ok(PutOutcome::AlreadyPresent) => {
                // The store kept the first aggregate; the cache must mirror it.
                if !self.reads.cache().contains(&order_uid) {
                    match self.reads.fetch_and_cache(&order_uid).await {
                        Ok(_) => self.publish_cache_stats(),
                        Err(e) => tracing::warn!(
                            order_uid = %order_uid,
                            error = %e,
                            "Failed to backfill cache for duplicate order"
                        ),
                    }
                }
                tracing::debug!(order_uid = %order_uid, "Duplicate order event ignored");
                IngestOutcome::Duplicate { order_uid }
            }
            Err(e) => {
                tracing::error!(order_uid = %order_uid, error = %e, "Failed to persist order");
                IngestOutcome::PersistFailed {
                    order_uid,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn publish_cache_stats(&self) {
        if let Some(metrics) = metrics() {
            metrics.record_cache_stats(&self.reads.cache().stats());
        }
    }

    async fn handle_event(&self, event: &InboundEvent) -> IngestOutcome {
        let outcome = self.handle_payload(&event.payload).await;
        tracing::trace!(
            subject = %event.subject,
            sequence = ?event.sequence,
            stage = ?outcome.stage(),
            outcome = outcome.label(),
            "Event handled"
        );
        outcome
    }

    /// Consume `source` until it ends, fails, or shutdown is signalled.
    ///
    /// Each event is committed after it has been handled, whatever the
    /// outcome, and before the next one is read. A failed commit is counted
    /// and the loop continues; the broker redelivers and the write is
    /// idempotent.
    pub async fn run<S>(
        &self,
        source: &mut S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<IngestSnapshot, EventStreamError>
    where
        S: EventSource + ?Sized,
    {
        tracing::info!("Ingestion pipeline started");

        let result = loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Ingestion pipeline shutting down");
                break Ok(());
            }

            let next = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        tracing::info!("Shutdown channel closed, stopping ingestion");
                        break Ok(());
                    }
                    continue;
                }

                next = source.next_event() => next,
            };

            match next {
                Ok(Some(event)) => {
                    self.handle_event(&event).await;
                    if let Err(e) = source.commit().await {
                        self.metrics.ack_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, sequence = ?event.sequence, "Failed to commit event");
                    }
                }
                Ok(None) => {
                    tracing::info!("Event stream ended");
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Event stream failed");
                    break Err(e);
                }
            }
        };

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            received = snapshot.received,
            cached = snapshot.cached,
            duplicates = snapshot.duplicates,
            rejected = snapshot.rejected,
            persist_failed = snapshot.persist_failed,
            ack_failures = snapshot.ack_failures,
            "Ingestion pipeline completed"
        );

        result.map(|()| snapshot)
    }
}
