// ============================================================================
// Domain Layer
// ============================================================================
//
// Aggregates known to this query service and their wire codecs. Transport
// and correlation live elsewhere (event_sourcing/, messaging/, query/).
//
// ============================================================================

pub mod flashsale;
