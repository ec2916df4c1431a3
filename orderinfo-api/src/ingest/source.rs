//! Event Sources
//!
//! An [`EventSource`] yields inbound order events one at a time. After the
//! pipeline finishes with an event it calls [`EventSource::commit`], which
//! acknowledges that event to the broker before the next one is requested.

use async_trait::async_trait;
use bytes::Bytes;
use orderinfo_core::EventStreamError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One message read from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Raw message body (one JSON order)
    pub payload: Bytes,
    /// Subject or topic the message arrived on
    pub subject: String,
    /// Broker sequence number, when the broker assigns one
    pub sequence: Option<u64>,
}

impl InboundEvent {
    /// Create an event with no subject or sequence.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            subject: String::new(),
            sequence: None,
        }
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the broker sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// A sequential source of inbound events.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event.
    ///
    /// `Ok(None)` means the source ended cleanly. An `Err` is a stream-level
    /// failure; the caller stops reading.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, EventStreamError>;

    /// Acknowledge the most recently returned event.
    async fn commit(&mut self) -> Result<(), EventStreamError>;
}

/// Sender half paired with a [`ChannelEventSource`].
pub type EventSender = mpsc::Sender<Result<InboundEvent, EventStreamError>>;

/// In-process event source backed by a tokio mpsc channel.
///
/// Dropping every sender ends the source cleanly. Sending an `Err` makes the
/// next read fail with that error.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: mpsc::Receiver<Result<InboundEvent, EventStreamError>>,
    committed: Arc<AtomicU64>,
}

impl ChannelEventSource {
    /// Create a bounded channel and its source.
    pub fn channel(buffer: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        let source = Self {
            rx,
            committed: Arc::new(AtomicU64::new(0)),
        };
        (tx, source)
    }

    /// Shared counter of committed events, readable after the source moves.
    pub fn commit_counter(&self) -> Arc<AtomicU64> {
        self.committed.clone()
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, EventStreamError> {
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn commit(&mut self) -> Result<(), EventStreamError> {
        self.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
