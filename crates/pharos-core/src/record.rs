//! Agent records and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle to the caller-owned agent object.
///
/// The registry never inspects or calls it; capability text and identity are
/// supplied explicitly at registration, so the registry stays decoupled from
/// any particular agent implementation. Lifecycle ownership stays with the
/// caller — the registry only holds a refcount.
pub type AgentHandle = Arc<dyn Any + Send + Sync>;

/// Status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent is alive and heartbeating
    Active,
    /// Agent missed its heartbeat window
    Unhealthy,
    /// Caller-declared reduced capacity; never set by the monitor
    Degraded,
    /// Caller-declared unavailability; never set by the monitor
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A registered agent.
#[derive(Clone)]
pub struct AgentRecord {
    /// Unique agent id, generated at registration
    pub agent_id: Uuid,
    /// Owning runtime; immutable after registration
    pub runtime_id: String,
    /// Free-text capability descriptors, in registration order
    pub capabilities: Vec<String>,
    /// Current status
    pub status: AgentStatus,
    /// When the agent was registered
    pub registered_at: DateTime<Utc>,
    /// Last heartbeat timestamp (set on registration and on every heartbeat)
    pub last_heartbeat: DateTime<Utc>,
    /// Opaque caller-owned handle
    pub handle: AgentHandle,
}

impl AgentRecord {
    /// Create a new record with a fresh v4 id, `Active` status, and both
    /// timestamps set to now.
    pub fn new(
        handle: AgentHandle,
        runtime_id: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: Uuid::new_v4(),
            runtime_id: runtime_id.into(),
            capabilities,
            status: AgentStatus::Active,
            registered_at: now,
            last_heartbeat: now,
            handle,
        }
    }
}

// Manual impl: the handle is opaque and has no useful Debug output.
impl std::fmt::Debug for AgentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRecord")
            .field("agent_id", &self.agent_id)
            .field("runtime_id", &self.runtime_id)
            .field("capabilities", &self.capabilities)
            .field("status", &self.status)
            .field("registered_at", &self.registered_at)
            .field("last_heartbeat", &self.last_heartbeat)
            .finish_non_exhaustive()
    }
}

/// Serializable summary view of an agent (no handle).
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    /// Unique agent id
    pub agent_id: Uuid,
    /// Owning runtime
    pub runtime_id: String,
    /// Capability descriptors
    pub capabilities: Vec<String>,
    /// Current status
    pub status: AgentStatus,
    /// When the agent was registered
    pub registered_at: DateTime<Utc>,
    /// Last heartbeat timestamp
    pub last_heartbeat: DateTime<Utc>,
}

impl From<&AgentRecord> for AgentSummary {
    fn from(record: &AgentRecord) -> Self {
        Self {
            agent_id: record.agent_id,
            runtime_id: record.runtime_id.clone(),
            capabilities: record.capabilities.clone(),
            status: record.status,
            registered_at: record.registered_at,
            last_heartbeat: record.last_heartbeat,
        }
    }
}
