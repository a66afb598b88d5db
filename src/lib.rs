// ============================================================================
// flashsale-query
// ============================================================================
//
// Query side of the flashsale service:
// - domain/flashsale: the aggregate and its BSON / JSON codec
// - event_sourcing:   event and response envelopes
// - messaging:        bus abstraction (Redpanda, in-memory)
// - actors:           correlation registry
// - query:            dispatcher and response listener
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod identifiers;
pub mod messaging;
pub mod metrics;
pub mod query;
pub mod utils;
pub mod wire;
