// ============================================================================
// Actors Module
// ============================================================================
//
// Actors own shared mutable state that several tasks touch concurrently.
// The query side has one: the registry of queries waiting for a response.
//
// ============================================================================

mod correlation_registry;

pub use correlation_registry::{
    CorrelationRegistry, Deregister, PendingCount, Register, Resolution, Resolve, Sweep,
    DEFAULT_SWEEP_INTERVAL,
};
