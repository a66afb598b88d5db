// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Envelope types shared by every aggregate on the bus.
// Domain-specific payloads are in src/domain/
//
// ============================================================================

mod core;

pub use self::core::*;
