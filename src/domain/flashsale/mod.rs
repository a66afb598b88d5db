// ============================================================================
// Flashsale Domain
// ============================================================================
//
// - Value objects (FlashsaleField, aggregate tag)
// - Aggregate (Flashsale)
// - Codec (BSON / JSON encode, checked decode)
// - Query filter (payload of query events)
// - Errors (CodecError)
//
// ============================================================================

pub mod value_objects;
pub mod aggregate;
pub mod codec;
pub mod query;
pub mod errors;

pub use value_objects::*;
pub use aggregate::*;
pub use query::*;
pub use errors::*;
