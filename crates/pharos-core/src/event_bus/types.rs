use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::record::AgentStatus;

/// Kinds of events emitted by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryEventKind {
    /// An agent was registered
    AgentRegistered,
    /// An agent was removed, by its caller or by the health monitor
    /// (distinguished via the `reason` metadata key)
    AgentDeregistered,
    /// An agent's status changed (`old_status`/`new_status` in metadata)
    AgentStatusChanged,
    /// An agent sent a heartbeat
    AgentHeartbeat,
    /// A runtime registered its first agent
    RuntimeJoined,
    /// A runtime's last agent was removed
    RuntimeLeft,
}

/// Policy applied when the event queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room (default)
    #[default]
    DropOldest,
    /// Drop the incoming event
    DropNewest,
}

/// An immutable event describing one registry state change.
///
/// Events are dispatched and discarded; they are never persisted or
/// replayed to late subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEvent {
    /// What happened
    pub kind: RegistryEventKind,
    /// Affected agent, absent for pure runtime events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Uuid>,
    /// Affected runtime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    /// Event-specific details (e.g. old/new status, deregistration reason)
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
}

impl RegistryEvent {
    /// Create a bare event of the given kind.
    pub fn new(kind: RegistryEventKind) -> Self {
        Self {
            kind,
            agent_id: None,
            runtime_id: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create an agent-scoped event.
    pub fn agent(kind: RegistryEventKind, agent_id: Uuid, runtime_id: &str) -> Self {
        let mut event = Self::new(kind);
        event.agent_id = Some(agent_id);
        event.runtime_id = Some(runtime_id.to_string());
        event
    }

    /// Create a runtime-scoped event.
    pub fn runtime(kind: RegistryEventKind, runtime_id: &str) -> Self {
        let mut event = Self::new(kind);
        event.runtime_id = Some(runtime_id.to_string());
        event
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Create a status-change event carrying the old/new statuses and the
    /// reason for the transition.
    pub fn status_change(
        agent_id: Uuid,
        runtime_id: &str,
        old_status: AgentStatus,
        new_status: AgentStatus,
        reason: &str,
    ) -> Self {
        Self::agent(RegistryEventKind::AgentStatusChanged, agent_id, runtime_id)
            .with_metadata("old_status", serde_json::json!(old_status))
            .with_metadata("new_status", serde_json::json!(new_status))
            .with_metadata("reason", serde_json::json!(reason))
    }

    /// Create a deregistration event; `reason` is `"caller"` for explicit
    /// deregistration or `"timeout"` for monitor-driven eviction.
    pub fn deregistered(agent_id: Uuid, runtime_id: &str, reason: &str) -> Self {
        Self::agent(RegistryEventKind::AgentDeregistered, agent_id, runtime_id)
            .with_metadata("reason", serde_json::json!(reason))
    }
}
