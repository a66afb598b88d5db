use async_trait::async_trait;
use futures_util::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::bus::{BusError, InboundMessage, MessageBus, MessageStream, Subscription};

// ============================================================================
// In-Memory Bus
// ============================================================================
//
// Process-local bus for tests and local runs. Every live subscriber of a
// topic receives every message published after it subscribed (consumer
// groups are not load balanced). A log of published payloads is kept per
// topic.
//
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<Mutex<Topics>>,
}

#[derive(Default)]
struct Topics {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<InboundMessage>>>,
    log: HashMap<String, Vec<Vec<u8>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published to `topic`, oldest first.
    pub async fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        self.inner.lock().await.log.get(topic).cloned().unwrap_or_default()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .await
            .subscribers
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let mut topics = self.inner.lock().await;

        let log = topics.log.entry(topic.to_string()).or_default();
        let offset = log.len() as i64;
        log.push(payload.to_vec());

        let message = InboundMessage {
            topic: topic.to_string(),
            key: None,
            payload: payload.to_vec(),
            partition: 0,
            offset,
        };

        if let Some(subscribers) = topics.subscribers.get_mut(topic) {
            subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        }

        tracing::trace!(topic = %topic, offset = offset, "Published in-memory message");
        Ok(())
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<MessageStream, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .await
            .subscribers
            .entry(subscription.topic.clone())
            .or_default()
            .push(tx);

        tracing::debug!(
            topic = %subscription.topic,
            group = %subscription.group,
            "Subscribed to in-memory topic"
        );

        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (Ok::<_, BusError>(message), rx))
        });
        Ok(Box::pin(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::consume;
    use std::ops::ControlFlow;

    #[tokio::test]
    async fn test_subscribers_receive_later_messages() {
        let bus = InMemoryBus::new();
        bus.publish("events", b"before").await.unwrap();

        let subscription = Subscription::new("events", "group-a");
        let mut stream = bus.subscribe(&subscription).await.unwrap();
        bus.publish("events", b"after").await.unwrap();
        bus.publish("other", b"elsewhere").await.unwrap();

        use futures_util::StreamExt;
        let message = stream.next().await.unwrap().unwrap();
        assert_eq!(message.payload, b"after");
        assert_eq!(message.offset, 1);
        assert_eq!(bus.published("events").await.len(), 2);
    }

    #[tokio::test]
    async fn test_consume_stops_when_handler_breaks() {
        let bus = InMemoryBus::new();
        let subscription = Subscription::new("events", "group-a");

        let consumer = {
            let bus = bus.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                consume(&bus, &subscription, |message| {
                    seen.push(message.payload.clone());
                    let done = message.payload == b"stop";
                    async move {
                        if done {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    }
                })
                .await
                .unwrap();
                seen
            })
        };

        while bus.subscriber_count("events").await == 0 {
            tokio::task::yield_now().await;
        }
        for payload in [b"one".as_slice(), b"stop".as_slice(), b"ignored".as_slice()] {
            bus.publish("events", payload).await.unwrap();
        }

        let seen = consumer.await.unwrap();
        assert_eq!(seen, vec![b"one".to_vec(), b"stop".to_vec()]);
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_pruned() {
        let bus = InMemoryBus::new();
        let stream = bus.subscribe(&Subscription::new("t", "g")).await.unwrap();
        assert_eq!(bus.subscriber_count("t").await, 1);

        drop(stream);
        bus.publish("t", b"x").await.unwrap();
        assert_eq!(bus.subscriber_count("t").await, 0);
    }
}
