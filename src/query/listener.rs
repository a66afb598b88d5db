use kameo::actor::ActorRef;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::actors::{CorrelationRegistry, Resolve};
use crate::event_sourcing::KafkaResponse;
use crate::messaging::{
    consume_stream, BusError, InboundMessage, MessageBus, MessageStream, Subscription,
};
use crate::metrics::Metrics;

// ============================================================================
// Response Listener - feeds the response topic into the registry
// ============================================================================
//
// Malformed payloads are logged and skipped. The loop only stops when the
// stream ends or the registry is gone.
//
// ============================================================================

pub struct ResponseListener<B: MessageBus + ?Sized> {
    bus: Arc<B>,
    subscription: Subscription,
    registry: ActorRef<CorrelationRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl<B: MessageBus + ?Sized + 'static> ResponseListener<B> {
    pub fn new(
        bus: Arc<B>,
        subscription: Subscription,
        registry: ActorRef<CorrelationRegistry>,
    ) -> Self {
        Self {
            bus,
            subscription,
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Subscribe and consume in the current task.
    pub async fn run(self) -> Result<(), BusError> {
        let stream = self.bus.subscribe(&self.subscription).await?;
        self.drive(stream).await;
        Ok(())
    }

    /// Subscribe, then consume on a background task. The subscription is
    /// live once this returns.
    pub async fn spawn(self) -> Result<JoinHandle<()>, BusError> {
        let stream = self.bus.subscribe(&self.subscription).await?;
        Ok(tokio::spawn(async move { self.drive(stream).await }))
    }

    async fn drive(self, stream: MessageStream) {
        tracing::info!(
            topic = %self.subscription.topic,
            group = %self.subscription.group,
            "Response listener started"
        );

        let registry = self.registry;
        let metrics = self.metrics;
        consume_stream(stream, |message| {
            let registry = registry.clone();
            let metrics = metrics.clone();
            async move { handle_response(&registry, metrics.as_deref(), message).await }
        })
        .await;

        tracing::info!("Response listener stopped");
    }
}

async fn handle_response(
    registry: &ActorRef<CorrelationRegistry>,
    metrics: Option<&Metrics>,
    message: InboundMessage,
) -> ControlFlow<()> {
    let response = match KafkaResponse::from_bytes(&message.payload) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Skipping malformed response"
            );
            if let Some(metrics) = metrics {
                metrics.record_response("malformed");
            }
            return ControlFlow::Continue(());
        }
    };

    let time_uuid = response.uuid;
    match registry.ask(Resolve(response)).await {
        Ok(resolution) => {
            tracing::debug!(
                time_uuid = %time_uuid,
                outcome = resolution.as_str(),
                "Response resolved"
            );
            if let Some(metrics) = metrics {
                metrics.record_response(resolution.as_str());
            }
            ControlFlow::Continue(())
        }
        Err(e) => {
            tracing::error!(error = ?e, "Correlation registry unavailable, stopping listener");
            ControlFlow::Break(())
        }
    }
}
