// ============================================================================
// Event Sourcing Core - Bus Envelopes
// ============================================================================
//
// The two records exchanged with the rest of the system over the bus:
// - Event:         published by this service (insert / query / ...)
// - KafkaResponse: consumed back, matched by time uuid
//
// ============================================================================

pub mod event;
pub mod response;
mod payload;

// Re-export core types for convenience
pub use event::{Action, EnvelopeError, Event};
pub use response::KafkaResponse;
