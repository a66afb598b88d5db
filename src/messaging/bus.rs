use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;

// ============================================================================
// Message Bus - the publish/subscribe collaborator
// ============================================================================
//
// The core only needs two primitives from the bus:
// - publish(topic, bytes)
// - a subscription yielding inbound messages for a topic
//
// `consume` drives a subscription with a handler that decides after every
// message whether to keep going.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Failed to publish to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Failed to subscribe to {topic}: {reason}")]
    SubscriptionFailed { topic: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Circuit breaker open, not publishing to {topic}")]
    CircuitOpen { topic: String },
}

/// Topic plus consumer group to read it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub group: String,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, BusError>> + Send>>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    async fn subscribe(&self, subscription: &Subscription) -> Result<MessageStream, BusError>;
}

/// Subscribe and feed every message to `handler` until it breaks or the
/// stream ends.
pub async fn consume<B, F, Fut>(
    bus: &B,
    subscription: &Subscription,
    handler: F,
) -> Result<(), BusError>
where
    B: MessageBus + ?Sized,
    F: FnMut(InboundMessage) -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    let stream = bus.subscribe(subscription).await?;
    consume_stream(stream, handler).await;
    Ok(())
}

/// Drive an already open subscription. Transport errors are logged and
/// skipped; they never reach the handler.
pub async fn consume_stream<F, Fut>(mut stream: MessageStream, mut handler: F)
where
    F: FnMut(InboundMessage) -> Fut,
    Fut: Future<Output = ControlFlow<()>>,
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => {
                if handler(message).await.is_break() {
                    tracing::debug!("Handler stopped consumption");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping failed delivery");
            }
        }
    }

    tracing::debug!("Subscription stream ended");
}
