use std::time::Duration;

use crate::domain::flashsale::CodecError;
use crate::event_sourcing::EnvelopeError;
use crate::identifiers::TimeUuid;
use crate::messaging::BusError;

// ============================================================================
// Dispatch Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No response for {time_uuid} within {waited:?}")]
    Timeout { time_uuid: TimeUuid, waited: Duration },

    /// The executor answered with an error; passed through untouched.
    #[error("Query failed remotely (code {code}): {error}")]
    Remote { error: String, code: i16 },

    #[error("Failed to encode event payload: {0}")]
    Encode(#[source] CodecError),

    #[error("Failed to decode query result: {0}")]
    Decode(#[source] CodecError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("Failed to publish event: {0}")]
    Publish(#[from] BusError),

    #[error("Correlation registry unavailable: {0}")]
    Registry(String),

    #[error("Time uuid {0} is already pending")]
    DuplicateRequest(TimeUuid),
}

impl DispatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout { .. })
    }

    /// Whether sending a fresh event for the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Timeout { .. }
                | DispatchError::Publish(_)
                | DispatchError::DuplicateRequest(_)
        )
    }

    /// Short label used for the failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Timeout { .. } => "timeout",
            DispatchError::Remote { .. } => "remote",
            DispatchError::Encode(_) => "encode",
            DispatchError::Decode(_) => "decode",
            DispatchError::Envelope(_) => "envelope",
            DispatchError::Publish(_) => "publish",
            DispatchError::Registry(_) => "registry",
            DispatchError::DuplicateRequest(_) => "duplicate",
        }
    }
}
