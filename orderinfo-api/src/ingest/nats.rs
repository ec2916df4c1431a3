//! NATS JetStream event source and publisher.
//!
//! Broker addresses map to NATS server URLs, the topic is the subject the
//! orders are published on, the stream name is the JetStream stream that
//! captures that subject, and the consumer group is the durable pull
//! consumer name. Every instance sharing a group shares one delivery cursor.

use async_nats::jetstream::{
    self,
    consumer::{
        pull::{self, MessagesErrorKind},
        AckPolicy,
    },
    stream,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use orderinfo_core::EventStreamError;
use tracing::{debug, info, warn};

use super::source::{EventSource, InboundEvent};
use crate::config::StreamConfig;

/// Connect to the brokers and make sure the order stream exists.
async fn connect_stream(
    config: &StreamConfig,
) -> Result<(jetstream::Context, stream::Stream), EventStreamError> {
    let brokers = config.broker_list();
    let connect_err = |reason: String| EventStreamError::Connect {
        brokers: brokers.clone(),
        reason,
    };

    let client = async_nats::connect(brokers.as_str())
        .await
        .map_err(|e| connect_err(e.to_string()))?;
    let context = jetstream::new(client);

    let stream = context
        .get_or_create_stream(stream::Config {
            name: config.stream_name.clone(),
            subjects: vec![config.topic.clone()],
            ..Default::default()
        })
        .await
        .map_err(|e| connect_err(e.to_string()))?;

    Ok((context, stream))
}

/// Pull errors after which the consumer keeps delivering.
fn is_transient(kind: MessagesErrorKind) -> bool {
    !matches!(
        kind,
        MessagesErrorKind::ConsumerDeleted | MessagesErrorKind::PushBasedConsumer
    )
}

/// Durable pull consumer over the order subject.
///
/// Messages are acknowledged explicitly through [`EventSource::commit`]; a
/// message that is never committed is redelivered after the ack wait.
pub struct NatsEventSource {
    messages: pull::Stream,
    pending: Option<jetstream::Message>,
    topic: String,
}

impl NatsEventSource {
    /// Connect and bind the durable consumer described by `config`.
    pub async fn connect(config: &StreamConfig) -> Result<Self, EventStreamError> {
        let (_, stream) = connect_stream(config).await?;

        let subscribe_err = |reason: String| EventStreamError::Subscribe {
            topic: config.topic.clone(),
            group: config.group.clone(),
            reason,
        };

        let consumer = stream
            .get_or_create_consumer(
                &config.group,
                pull::Config {
                    durable_name: Some(config.group.clone()),
                    filter_subject: config.topic.clone(),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        info!(
            brokers = %config.broker_list(),
            topic = %config.topic,
            stream = %config.stream_name,
            group = %config.group,
            "Event stream consumer bound"
        );

        Ok(Self {
            messages,
            pending: None,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl EventSource for NatsEventSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, EventStreamError> {
        let message = loop {
            match self.messages.next().await {
                Some(Ok(message)) => break message,
                Some(Err(e)) if is_transient(e.kind()) => {
                    warn!(topic = %self.topic, error = %e, "Pull stream error, continuing");
                }
                Some(Err(e)) => {
                    return Err(EventStreamError::Read {
                        reason: e.to_string(),
                    })
                }
                // A pull consumer never ends on its own
                None => return Err(EventStreamError::Closed),
            }
        };

        let mut event = InboundEvent::new(message.message.payload.clone())
            .with_subject(message.message.subject.to_string());
        if let Ok(info) = message.info() {
            event = event.with_sequence(info.stream_sequence);
        }

        self.pending = Some(message);
        Ok(Some(event))
    }

    async fn commit(&mut self) -> Result<(), EventStreamError> {
        let Some(message) = self.pending.take() else {
            return Ok(());
        };
        message.ack().await.map_err(|e| EventStreamError::Ack {
            reason: e.to_string(),
        })?;
        debug!(topic = %self.topic, "Message acknowledged");
        Ok(())
    }
}

impl std::fmt::Debug for NatsEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEventSource")
            .field("topic", &self.topic)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// Publishes order payloads to the order subject.
#[derive(Clone)]
pub struct NatsOrderPublisher {
    jetstream: jetstream::Context,
    topic: String,
}

impl NatsOrderPublisher {
    /// Connect to the brokers, creating the stream when missing.
    pub async fn connect(config: &StreamConfig) -> Result<Self, EventStreamError> {
        let (jetstream, _) = connect_stream(config).await?;
        Ok(Self {
            jetstream,
            topic: config.topic.clone(),
        })
    }

    /// Publish one payload and wait for the server acknowledgement.
    ///
    /// Returns the stream sequence assigned to the message.
    pub async fn publish(&self, payload: impl Into<Bytes>) -> Result<u64, EventStreamError> {
        let publish_err = |reason: String| EventStreamError::Publish { reason };
        let ack = self
            .jetstream
            .publish(self.topic.clone(), payload.into())
            .await
            .map_err(|e| publish_err(e.to_string()))?
            .await
            .map_err(|e| publish_err(e.to_string()))?;
        Ok(ack.sequence)
    }

    /// Subject the publisher writes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for NatsOrderPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsOrderPublisher")
            .field("topic", &self.topic)
            .finish()
    }
}
