//! EventBus - bounded-queue publish/subscribe for registry events.
//!
//! Publishing enqueues and returns immediately; a single dispatcher task
//! drains the queue and invokes subscriber callbacks sequentially, so a
//! slow subscriber never blocks a caller's mutating registry call. Losses
//! under overflow are counted, never silent.

/// Core event bus implementation (bounded queue + dispatcher).
pub mod bus;
/// Event type definitions for the registry lifecycle.
pub mod types;

pub use bus::{EventBus, EventSubscriber, SubscriptionId};
pub use types::{OverflowPolicy, RegistryEvent, RegistryEventKind};
