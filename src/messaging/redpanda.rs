use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::time::Duration;

use super::bus::{BusError, InboundMessage, MessageBus, MessageStream, Subscription};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

// ============================================================================
// Redpanda / Kafka bus
// ============================================================================
//
// Publishing goes through one shared producer guarded by a circuit breaker.
// Every subscription gets its own consumer in its own group, owned by a
// forwarding task. Offsets are committed only after the message has been
// handed to the subscriber's channel, so a crash redelivers rather than
// drops.
//
// ============================================================================

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BUFFER_SIZE: usize = 1000;

pub struct RedpandaBus {
    producer: FutureProducer,
    brokers: String,
    send_timeout: Duration,
    buffer_size: usize,
    auto_offset_reset: String,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaBus {
    pub fn builder() -> RedpandaBusBuilder {
        RedpandaBusBuilder::default()
    }

    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    pub async fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset().await;
    }
}

#[derive(Default)]
pub struct RedpandaBusBuilder {
    brokers: Option<String>,
    acks: Option<String>,
    send_timeout: Option<Duration>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
    circuit_breaker: Option<CircuitBreakerConfig>,
}

impl RedpandaBusBuilder {
    /// Comma separated `host:port` list.
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgement level, `all` unless set.
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Capacity of the channel between a consumer task and its subscriber.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Where a new consumer group starts reading, `latest` unless set.
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn build(self) -> Result<RedpandaBus, BusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BusError::Transport("no brokers configured".to_string()))?;
        let send_timeout = self.send_timeout.unwrap_or(DEFAULT_SEND_TIMEOUT);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .set("acks", self.acks.as_deref().unwrap_or("all"))
            .create()
            .map_err(|e| BusError::Transport(format!("Failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, "Redpanda producer created");

        Ok(RedpandaBus {
            producer,
            brokers,
            send_timeout,
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
            circuit_breaker: CircuitBreaker::new(
                "redpanda-producer",
                self.circuit_breaker.unwrap_or_default(),
            ),
        })
    }
}

#[async_trait]
impl MessageBus for RedpandaBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);
                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(topic = %topic, bytes = payload.len(), "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(_)) => {
                tracing::error!(topic = %topic, "Circuit breaker open - Redpanda unavailable");
                Err(BusError::CircuitOpen {
                    topic: topic.to_string(),
                })
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(error = %e, topic = %topic, "Failed to publish to Redpanda");
                Err(BusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<MessageStream, BusError> {
        let topic = subscription.topic.clone();
        let subscribe_error = |reason: String| BusError::SubscriptionFailed {
            topic: topic.clone(),
            reason,
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &subscription.group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| subscribe_error(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[topic.as_str()])
            .map_err(|e| subscribe_error(e.to_string()))?;

        tracing::info!(
            topic = %topic,
            group = %subscription.group,
            auto_offset_reset = %self.auto_offset_reset,
            "Subscribed to Redpanda topic"
        );

        let (tx, rx) = tokio::sync::mpsc::channel(self.buffer_size);

        tokio::spawn(async move {
            let mut messages = consumer.stream();

            while let Some(delivery) = messages.next().await {
                let message = match delivery {
                    Ok(message) => message,
                    Err(e) => {
                        let err = BusError::Transport(format!("Failed to receive message: {e}"));
                        if tx.send(Err(err)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let inbound = InboundMessage {
                    topic: message.topic().to_string(),
                    key: message.key().map(<[u8]>::to_vec),
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    partition: message.partition(),
                    offset: message.offset(),
                };

                if tx.send(Ok(inbound)).await.is_err() {
                    tracing::debug!("Subscriber dropped, stopping consumer task");
                    break;
                }

                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::warn!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Failed to commit offset (message may be redelivered)"
                    );
                }
            }

            tracing::debug!("Consumer task exiting");
        });

        let messages = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedpandaBus>();
    }

    #[test]
    fn test_build_requires_brokers() {
        let err = RedpandaBus::builder().build().err().unwrap();
        assert!(matches!(err, BusError::Transport(_)));
    }

    #[tokio::test]
    async fn test_build_does_not_connect() {
        let bus = RedpandaBus::builder()
            .brokers("localhost:1")
            .acks("1")
            .buffer_size(8)
            .auto_offset_reset("earliest")
            .build()
            .unwrap();

        assert_eq!(bus.brokers(), "localhost:1");
        assert_eq!(bus.circuit_state().await, CircuitState::Closed);
    }
}
