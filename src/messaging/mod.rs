pub mod bus;
pub mod memory;
pub mod redpanda;

pub use bus::{
    consume, consume_stream, BusError, InboundMessage, MessageBus, MessageStream, Subscription,
};
pub use memory::InMemoryBus;
pub use redpanda::{RedpandaBus, RedpandaBusBuilder};
