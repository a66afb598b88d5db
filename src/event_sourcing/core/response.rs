use serde::{Deserialize, Serialize};

use crate::domain::flashsale::{CodecError, Flashsale};
use crate::identifiers::{CorrelationId, TimeUuid};

use super::event::{EnvelopeError, Event};

// ============================================================================
// Response Envelope - the reply matched back to a pending request
// ============================================================================
//
// Produced by the external query executor exactly once per event. `uuid`
// echoes the event's time uuid and is the matching key; `error`/`errorCode`
// are passed through to callers without interpretation.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaResponse {
    #[serde(rename = "aggregateID")]
    pub aggregate_id: i8,

    #[serde(rename = "correlationID")]
    pub correlation_id: CorrelationId,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(rename = "errorCode")]
    pub error_code: i16,

    #[serde(with = "super::payload")]
    pub result: Vec<u8>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub topic: String,

    pub uuid: TimeUuid,
}

impl KafkaResponse {
    /// Successful answer to `event` carrying `items` as its result.
    pub fn success_for(event: &Event, items: &[Flashsale]) -> Result<Self, CodecError> {
        Ok(Self {
            aggregate_id: event.aggregate_id,
            correlation_id: event.correlation_id,
            result: Flashsale::encode_json_many(items)?,
            uuid: event.time_uuid,
            ..Self::default()
        })
    }

    pub fn failure_for(event: &Event, error: impl Into<String>, error_code: i16) -> Self {
        Self {
            aggregate_id: event.aggregate_id,
            correlation_id: event.correlation_id,
            error: error.into(),
            error_code,
            uuid: event.time_uuid,
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// A response is a failure when either error field is set.
    pub fn is_failure(&self) -> bool {
        !self.error.is_empty() || self.error_code != 0
    }

    /// Decode `result` into aggregates. An empty result means no match.
    pub fn decode_result(&self) -> Result<Vec<Flashsale>, CodecError> {
        if self.result.is_empty() {
            return Ok(Vec::new());
        }
        Flashsale::decode_json_many(&self.result)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|source| EnvelopeError::Serialize {
            kind: "response",
            source,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|source| EnvelopeError::Deserialize {
            kind: "response",
            source,
        })
    }
}
