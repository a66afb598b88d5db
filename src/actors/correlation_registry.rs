use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::event_sourcing::KafkaResponse;
use crate::identifiers::{CorrelationId, TimeUuid};
use crate::metrics::Metrics;

// ============================================================================
// Correlation Registry Actor - pending queries keyed by time uuid
// ============================================================================
//
// Registration (publish path) and resolution (response path) both go
// through this actor's mailbox, so they never race.
//
// An entry leaves the map exactly once:
// - Resolve: removed, then the response is handed to the waiting caller
// - Deregister: removed by the caller after a timeout, failed publish or
//   cancellation
// - Sweep: removed on a periodic tick once the caller's receiver is gone
//
// Anything arriving for a uuid that is not in the map is unmatched and
// dropped, which covers duplicates and late responses.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct Register {
    pub time_uuid: TimeUuid,
    pub correlation_id: CorrelationId,
    pub reply_to: oneshot::Sender<KafkaResponse>,
}

#[derive(Debug)]
pub struct Resolve(pub KafkaResponse);

#[derive(Debug)]
pub struct Deregister {
    pub time_uuid: TimeUuid,
}

#[derive(Debug)]
pub struct PendingCount;

/// Drop entries whose caller is no longer waiting. Replies with the number
/// removed.
#[derive(Debug)]
pub struct Sweep;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Handed to the waiting caller.
    Delivered,
    /// No pending entry for the uuid.
    Unmatched,
    /// Entry existed but the caller stopped waiting.
    CallerGone,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Delivered => "delivered",
            Resolution::Unmatched => "unmatched",
            Resolution::CallerGone => "caller_gone",
        }
    }
}

impl Reply for Resolution {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Actor
// ============================================================================

struct Pending {
    correlation_id: CorrelationId,
    reply_to: oneshot::Sender<KafkaResponse>,
    registered_at: Instant,
}

pub struct CorrelationRegistry {
    pending: HashMap<TimeUuid, Pending>,
    metrics: Option<Arc<Metrics>>,
    sweep_interval: Duration,
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            metrics: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn publish_pending(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_pending(self.pending.len());
        }
    }
}

impl Actor for CorrelationRegistry {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("CorrelationRegistry started");

        let sweep_interval = state.sweep_interval;
        let actor_ref = actor_ref.downgrade();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(registry) = actor_ref.upgrade() else {
                    break;
                };
                if registry.tell(Sweep).await.is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<Register> for CorrelationRegistry {
    type Reply = bool;

    async fn handle(
        &mut self,
        msg: Register,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.pending.contains_key(&msg.time_uuid) {
            tracing::warn!(
                time_uuid = %msg.time_uuid,
                "Time uuid already pending, not registering"
            );
            return false;
        }

        self.pending.insert(
            msg.time_uuid,
            Pending {
                correlation_id: msg.correlation_id,
                reply_to: msg.reply_to,
                registered_at: Instant::now(),
            },
        );
        self.publish_pending();

        tracing::debug!(
            time_uuid = %msg.time_uuid,
            correlation_id = %msg.correlation_id,
            pending = self.pending.len(),
            "Registered pending query"
        );
        true
    }
}

impl Message<Resolve> for CorrelationRegistry {
    type Reply = Resolution;

    async fn handle(&mut self, msg: Resolve, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let response = msg.0;
        let time_uuid = response.uuid;

        let Some(entry) = self.pending.remove(&time_uuid) else {
            tracing::debug!(time_uuid = %time_uuid, "No pending query for response, dropping");
            return Resolution::Unmatched;
        };
        self.publish_pending();

        if !response.correlation_id.is_nil() && response.correlation_id != entry.correlation_id {
            tracing::warn!(
                time_uuid = %time_uuid,
                expected = %entry.correlation_id,
                received = %response.correlation_id,
                "Correlation id mismatch, delivering by time uuid"
            );
        }

        let waited = entry.registered_at.elapsed();
        match entry.reply_to.send(response) {
            Ok(()) => {
                tracing::debug!(
                    time_uuid = %time_uuid,
                    waited_ms = waited.as_millis() as u64,
                    "Delivered response"
                );
                Resolution::Delivered
            }
            Err(_) => {
                tracing::debug!(time_uuid = %time_uuid, "Caller stopped waiting before delivery");
                Resolution::CallerGone
            }
        }
    }
}

impl Message<Deregister> for CorrelationRegistry {
    type Reply = bool;

    async fn handle(
        &mut self,
        msg: Deregister,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let removed = self.pending.remove(&msg.time_uuid).is_some();
        if removed {
            self.publish_pending();
            tracing::debug!(time_uuid = %msg.time_uuid, "Deregistered pending query");
        }
        removed
    }
}

impl Message<PendingCount> for CorrelationRegistry {
    type Reply = usize;

    async fn handle(
        &mut self,
        _msg: PendingCount,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.pending.len()
    }
}

impl Message<Sweep> for CorrelationRegistry {
    type Reply = usize;

    async fn handle(&mut self, _msg: Sweep, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let before = self.pending.len();
        self.pending.retain(|_, entry| !entry.reply_to.is_closed());
        let removed = before - self.pending.len();

        if removed > 0 {
            self.publish_pending();
            tracing::debug!(removed, pending = self.pending.len(), "Swept abandoned queries");
        }
        removed
    }
}
