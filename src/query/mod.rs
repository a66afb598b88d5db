// ============================================================================
// Query Side
// ============================================================================
//
// - dispatcher: publishes events and waits for correlated responses
// - listener: consumes the response topic and resolves pending queries
// - errors: DispatchError
//
// ============================================================================

mod dispatcher;
mod errors;
mod listener;

pub use dispatcher::{QueryDispatcher, DEFAULT_QUERY_TIMEOUT};
pub use errors::DispatchError;
pub use listener::ResponseListener;
