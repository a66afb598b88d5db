use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::flashsale::{CodecError, Flashsale, QueryFilter, FLASHSALE_AGGREGATE_ID};
use crate::identifiers::{CorrelationId, TimeUuid, UserId};

// ============================================================================
// Event Envelope - the message published onto the bus
// ============================================================================
//
// Created by a caller, published once, never modified afterwards. `data`
// holds the codec-encoded payload: a full aggregate for `insert`, a filter
// map for `query`.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Query,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Query => "query",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub action: Action,

    /// Tag selecting which aggregate kind the payload belongs to.
    #[serde(rename = "aggregateID", default)]
    pub aggregate_id: i8,

    #[serde(rename = "correlationID", default)]
    pub correlation_id: CorrelationId,

    #[serde(with = "super::payload", default)]
    pub data: Vec<u8>,

    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "userUUID", default)]
    pub user_uuid: UserId,

    /// Unique per event; the response echoes it back as `uuid`.
    #[serde(rename = "timeUUID", default)]
    pub time_uuid: TimeUuid,

    #[serde(default)]
    pub version: i64,

    /// Partition hint: the UTC year the event was created in.
    #[serde(rename = "yearBucket", default)]
    pub year_bucket: i16,
}

impl Event {
    /// New Flashsale event with a fresh time uuid and correlation id.
    pub fn new(action: Action, data: Vec<u8>) -> Self {
        let timestamp = Utc::now();
        Self {
            action,
            aggregate_id: FLASHSALE_AGGREGATE_ID,
            correlation_id: CorrelationId::new_v4(),
            data,
            timestamp,
            user_uuid: UserId::nil(),
            time_uuid: TimeUuid::now(),
            version: 0,
            year_bucket: year_bucket(timestamp),
        }
    }

    pub fn insert(flashsale: &Flashsale) -> Result<Self, CodecError> {
        Ok(Self::new(Action::Insert, flashsale.encode_json()?))
    }

    pub fn query(filter: &QueryFilter) -> Result<Self, CodecError> {
        Ok(Self::new(Action::Query, filter.encode()?))
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_user(mut self, user_uuid: UserId) -> Self {
        self.user_uuid = user_uuid;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Same payload and correlation, new time uuid and timestamp. Used when
    /// one logical transaction publishes several events.
    pub fn restamped(mut self) -> Self {
        self.timestamp = Utc::now();
        self.year_bucket = year_bucket(self.timestamp);
        self.time_uuid = TimeUuid::now();
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|source| EnvelopeError::Serialize {
            kind: "event",
            source,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|source| EnvelopeError::Deserialize {
            kind: "event",
            source,
        })
    }
}

fn year_bucket(timestamp: DateTime<Utc>) -> i16 {
    i16::try_from(timestamp.year()).unwrap_or(i16::MAX)
}

// ============================================================================
// Envelope Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Failed to serialize {kind}: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize {kind}: {source}")]
    Deserialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Tests
// ============================================================================
