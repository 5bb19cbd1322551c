//! Authoritative agent store with capability indexing.
//!
//! The store owns the `agent_id → AgentRecord` map and the capability index
//! and mutates them together, so every id in the index has a record and
//! every record with capabilities is indexed. The store is not internally
//! locked; the facade guards all of the mutable registry state with one
//! coarse lock.

use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::CapabilityIndex;
use crate::record::{AgentRecord, AgentStatus};

/// Map of registered agents plus the inverted capability index.
#[derive(Debug, Default)]
pub struct AgentStore {
    agents: HashMap<Uuid, AgentRecord>,
    index: CapabilityIndex,
}

impl AgentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record and index its capabilities.
    pub fn insert(&mut self, record: AgentRecord) -> Result<()> {
        if self.agents.contains_key(&record.agent_id) {
            return Err(Error::DuplicateAgent {
                agent_id: record.agent_id,
            });
        }
        self.index.insert(record.agent_id, &record.capabilities);
        self.agents.insert(record.agent_id, record);
        Ok(())
    }

    /// Remove a record and all of its index entries.
    pub fn remove(&mut self, agent_id: Uuid) -> Result<AgentRecord> {
        let record = self
            .agents
            .remove(&agent_id)
            .ok_or(Error::NotFound { agent_id })?;
        self.index.remove(agent_id, &record.capabilities);
        Ok(record)
    }

    /// Look up a record by id.
    pub fn get(&self, agent_id: Uuid) -> Option<&AgentRecord> {
        self.agents.get(&agent_id)
    }

    /// Mutable lookup, crate-internal: callers must not touch
    /// `capabilities` (the index would go stale) — status and heartbeat
    /// updates only.
    pub(crate) fn get_mut(&mut self, agent_id: Uuid) -> Option<&mut AgentRecord> {
        self.agents.get_mut(&agent_id)
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over all records in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentRecord> {
        self.agents.values()
    }

    /// The capability index (read-only).
    pub fn index(&self) -> &CapabilityIndex {
        &self.index
    }

    /// All records whose any capability contains `query` as a
    /// case-insensitive substring, optionally restricted to a status.
    ///
    /// Index candidates are confirmed against the full capability text, so
    /// queries spanning token boundaries ("code gen") match. Results are
    /// sorted by agent id for deterministic snapshot order. An empty query
    /// matches nothing.
    pub fn find_by_capability(
        &self,
        query: &str,
        status_filter: Option<AgentStatus>,
    ) -> Vec<AgentRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut matches: Vec<AgentRecord> = self
            .index
            .candidates(query)
            .into_iter()
            .filter_map(|agent_id| self.agents.get(&agent_id))
            .filter(|record| {
                record
                    .capabilities
                    .iter()
                    .any(|capability| capability.to_lowercase().contains(&needle))
            })
            .filter(|record| status_filter.is_none_or(|status| record.status == status))
            .cloned()
            .collect();
        matches.sort_by_key(|record| record.agent_id);
        matches
    }
}
