use kameo::actor::ActorRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::errors::DispatchError;
use crate::actors::{CorrelationRegistry, Deregister, Register};
use crate::domain::flashsale::{Flashsale, QueryFilter};
use crate::event_sourcing::{Event, KafkaResponse};
use crate::identifiers::TimeUuid;
use crate::messaging::MessageBus;
use crate::metrics::Metrics;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Query Dispatcher - request/response over the bus
// ============================================================================
//
// Per query:
//   register(time uuid) -> publish event -> wait for the matched response
//
// Registration is acknowledged by the registry before the event goes out,
// so a fast response always finds its entry. On publish failure, timeout or
// cancellation of the calling future the entry is deregistered and anything
// arriving later is dropped.
//
// ============================================================================

pub struct QueryDispatcher<B: MessageBus + ?Sized> {
    bus: Arc<B>,
    registry: ActorRef<CorrelationRegistry>,
    topic: String,
    timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl<B: MessageBus + ?Sized> Clone for QueryDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            registry: self.registry.clone(),
            topic: self.topic.clone(),
            timeout: self.timeout,
            metrics: self.metrics.clone(),
        }
    }
}

impl<B: MessageBus + ?Sized> QueryDispatcher<B> {
    /// `topic` is where events are published; responses come back through
    /// the `ResponseListener` feeding the same registry.
    pub fn new(
        bus: Arc<B>,
        registry: ActorRef<CorrelationRegistry>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            registry,
            topic: topic.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
            metrics: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Publish an insert event without waiting for an answer.
    pub async fn insert(&self, flashsale: &Flashsale) -> Result<TimeUuid, DispatchError> {
        let event = Event::insert(flashsale).map_err(DispatchError::Encode)?;
        self.publish(&event).await?;

        tracing::info!(
            time_uuid = %event.time_uuid,
            flash_id = %flashsale.flash_id,
            "Insert event published"
        );
        Ok(event.time_uuid)
    }

    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<Flashsale>, DispatchError> {
        self.query_with_timeout(filter, self.timeout).await
    }

    pub async fn query_with_timeout(
        &self,
        filter: &QueryFilter,
        timeout: Duration,
    ) -> Result<Vec<Flashsale>, DispatchError> {
        let event = Event::query(filter).map_err(DispatchError::Encode)?;
        let started = Instant::now();

        let outcome = self
            .dispatch_with_timeout(event, timeout)
            .await
            .and_then(|response| Self::into_items(&response));

        match &outcome {
            Ok(items) => {
                tracing::debug!(matches = items.len(), "Query answered");
                if let Some(metrics) = &self.metrics {
                    metrics.record_query_success(started.elapsed().as_secs_f64());
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "Query failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_query_failure(e.kind());
                    if let DispatchError::Decode(codec) = e {
                        metrics.record_codec_error(codec.format());
                    }
                }
            }
        }
        outcome
    }

    fn into_items(response: &KafkaResponse) -> Result<Vec<Flashsale>, DispatchError> {
        if response.is_failure() {
            return Err(DispatchError::Remote {
                error: response.error.clone(),
                code: response.error_code,
            });
        }
        response.decode_result().map_err(DispatchError::Decode)
    }

    /// Publish `event` and wait for the response carrying its time uuid.
    pub async fn dispatch(&self, event: Event) -> Result<KafkaResponse, DispatchError> {
        self.dispatch_with_timeout(event, self.timeout).await
    }

    pub async fn dispatch_with_timeout(
        &self,
        event: Event,
        timeout: Duration,
    ) -> Result<KafkaResponse, DispatchError> {
        let time_uuid = event.time_uuid;
        let (reply_to, response) = oneshot::channel();

        let accepted = self
            .registry
            .ask(Register {
                time_uuid,
                correlation_id: event.correlation_id,
                reply_to,
            })
            .await
            .map_err(|e| DispatchError::Registry(format!("{e:?}")))?;
        if !accepted {
            return Err(DispatchError::DuplicateRequest(time_uuid));
        }
        let mut guard = PendingGuard::new(self.registry.clone(), time_uuid);

        if let Err(e) = self.publish(&event).await {
            self.deregister(time_uuid).await;
            guard.disarm();
            return Err(e);
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, response).await;
        if outcome.is_err() {
            self.deregister(time_uuid).await;
        }
        guard.disarm();

        match outcome {
            Ok(Ok(response)) => {
                tracing::debug!(
                    time_uuid = %time_uuid,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Response matched"
                );
                Ok(response)
            }
            Ok(Err(_)) => Err(DispatchError::Registry(
                "pending query dropped without a response".to_string(),
            )),
            Err(_) => {
                let waited = started.elapsed();
                tracing::warn!(
                    time_uuid = %time_uuid,
                    waited_ms = waited.as_millis() as u64,
                    "Query timed out"
                );
                Err(DispatchError::Timeout { time_uuid, waited })
            }
        }
    }

    async fn publish(&self, event: &Event) -> Result<(), DispatchError> {
        let payload = event.to_bytes()?;

        let result = self.bus.publish(&self.topic, &payload).await;
        if let Some(metrics) = &self.metrics {
            if result.is_ok() {
                metrics.record_published(event.action.as_str());
            }
        }
        result?;

        tracing::debug!(
            topic = %self.topic,
            action = %event.action,
            time_uuid = %event.time_uuid,
            correlation_id = %event.correlation_id,
            "Event published"
        );
        Ok(())
    }

    async fn deregister(&self, time_uuid: TimeUuid) {
        if let Err(e) = self.registry.ask(Deregister { time_uuid }).await {
            tracing::error!(
                time_uuid = %time_uuid,
                error = ?e,
                "Failed to deregister pending query"
            );
        }
    }
}

/// Deregisters a pending query if the waiting future is dropped before it
/// reaches an outcome.
struct PendingGuard {
    registry: ActorRef<CorrelationRegistry>,
    time_uuid: TimeUuid,
    armed: bool,
}

impl PendingGuard {
    fn new(registry: ActorRef<CorrelationRegistry>, time_uuid: TimeUuid) -> Self {
        Self {
            registry,
            time_uuid,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let time_uuid = self.time_uuid;
        tracing::debug!(time_uuid = %time_uuid, "Query cancelled, deregistering");

        // A full mailbox falls back to an async send; the periodic sweep
        // covers the case where no runtime is left to run it.
        if self.registry.tell(Deregister { time_uuid }).try_send().is_err() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let registry = self.registry.clone();
                handle.spawn(async move {
                    let _ = registry.tell(Deregister { time_uuid }).await;
                });
            }
        }
    }
}
