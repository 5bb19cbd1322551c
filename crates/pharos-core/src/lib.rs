//! Pharos Core - In-Process Agent Registry
//!
//! A centralized coordination point that lets many independent runtime
//! processes register long-lived worker agents, discover them by
//! capability, and track their health:
//! - Registration: agents register with an opaque handle, an owning
//!   runtime id, and free-text capability descriptors
//! - Discovery: case-insensitive substring matching over an inverted
//!   capability index, snapshot-consistent
//! - Health: heartbeat-driven liveness with unhealthy transitions and
//!   timeout-based auto-deregistration
//! - Events: bounded-queue broadcast of registry state changes to
//!   asynchronous subscribers
//!
//! The registry is an in-memory, single-instance primitive; persistence,
//! clustering, and network transport are out of scope.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event_bus;
pub mod index;
mod monitor;
pub mod record;
pub mod registry;
pub mod runtimes;
pub mod store;

pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use event_bus::{
    EventBus, EventSubscriber, OverflowPolicy, RegistryEvent, RegistryEventKind, SubscriptionId,
};
pub use index::{tokenize, CapabilityIndex};
pub use record::{AgentHandle, AgentRecord, AgentStatus, AgentSummary};
pub use registry::AgentRegistry;
pub use runtimes::RuntimeTracker;
pub use store::AgentStore;
