//! Runtime membership tracking.
//!
//! Derived structure mapping a runtime id to the set of agents currently
//! registered from it, so the facade can emit runtime-level join/leave
//! events. Each agent appears in exactly one runtime's set, matching its
//! record's `runtime_id`.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Mapping of runtime id to the agents registered from that runtime.
#[derive(Debug, Default)]
pub struct RuntimeTracker {
    runtimes: HashMap<String, HashSet<Uuid>>,
}

impl RuntimeTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent under a runtime.
    ///
    /// Returns `true` when this is the runtime's first agent (the runtime
    /// joined).
    pub fn add(&mut self, runtime_id: &str, agent_id: Uuid) -> bool {
        match self.runtimes.get_mut(runtime_id) {
            Some(agents) => {
                agents.insert(agent_id);
                false
            }
            None => {
                self.runtimes
                    .insert(runtime_id.to_string(), HashSet::from([agent_id]));
                true
            }
        }
    }

    /// Remove an agent from a runtime's set.
    ///
    /// Returns `true` when this was the runtime's last agent (the runtime
    /// left); empty sets are dropped so the map never holds empty keys.
    pub fn remove(&mut self, runtime_id: &str, agent_id: Uuid) -> bool {
        if let Some(agents) = self.runtimes.get_mut(runtime_id) {
            agents.remove(&agent_id);
            if agents.is_empty() {
                self.runtimes.remove(runtime_id);
                return true;
            }
        }
        false
    }

    /// The agents currently registered from a runtime.
    pub fn agents_of(&self, runtime_id: &str) -> Option<&HashSet<Uuid>> {
        self.runtimes.get(runtime_id)
    }

    /// Whether the runtime has any registered agents.
    pub fn contains(&self, runtime_id: &str) -> bool {
        self.runtimes.contains_key(runtime_id)
    }

    /// Number of runtimes with at least one registered agent.
    pub fn runtime_count(&self) -> usize {
        self.runtimes.len()
    }

    /// Whether no runtimes are tracked.
    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    /// Iterate over runtime ids and their agent sets.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<Uuid>)> {
        self.runtimes.iter()
    }
}
