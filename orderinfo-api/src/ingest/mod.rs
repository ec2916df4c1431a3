//! Order event ingestion: event sources and the write-through pipeline.

pub mod nats;
pub mod pipeline;
pub mod source;

pub use nats::{NatsEventSource, NatsOrderPublisher};
pub use pipeline::{IngestMetrics, IngestOutcome, IngestPipeline, IngestSnapshot, IngestStage};
pub use source::{ChannelEventSource, EventSender, EventSource, InboundEvent};
