//! Queue module: event store, send state machine, retry policy and the
//! scheduler that ties them together.

mod builder;
mod lifecycle;
mod retry;
mod send_queue;
mod state;
mod store;

pub use builder::SendQueueBuilder;
pub use lifecycle::{LifecycleBridge, LifecycleSignal};
pub use retry::{DelayPolicy, SendCounters};
pub use send_queue::SendQueue;
pub use state::SendPhase;
pub use store::EventStore;
