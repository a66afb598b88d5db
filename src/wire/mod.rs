// ============================================================================
// Wire Layer - untyped documents made typed
// ============================================================================
//
// - value:  WireValue / WireMap, built from BSON documents or JSON objects
// - coerce: per-type coercions returning FieldError on mismatch
//
// ============================================================================

mod coerce;
mod value;

pub use coerce::FieldError;
pub use value::{WireMap, WireNumber, WireValue};
