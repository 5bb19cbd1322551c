//! AgentRegistry — the public facade.
//!
//! Coordinates the agent store, capability index, runtime tracker, health
//! monitor, and event bus under one coarse lock. Mutating operations never
//! block on I/O; the only slow path is event delivery, which is decoupled
//! through the bounded queue. Events are published while the state lock is
//! held, so queue arrival order matches mutation order and any single
//! agent's event stream is observed in real-time order by the dispatcher.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::event_bus::{
    EventBus, EventSubscriber, RegistryEvent, RegistryEventKind, SubscriptionId,
};
use crate::monitor;
use crate::record::{AgentHandle, AgentRecord, AgentStatus, AgentSummary};
use crate::runtimes::RuntimeTracker;
use crate::store::AgentStore;

/// Mutable registry state guarded by one coarse lock.
pub(crate) struct RegistryState {
    pub(crate) store: AgentStore,
    pub(crate) runtimes: RuntimeTracker,
}

/// State shared between the facade and its background tasks.
pub(crate) struct Shared {
    pub(crate) config: RegistryConfig,
    pub(crate) state: RwLock<RegistryState>,
    pub(crate) bus: EventBus,
    closed: AtomicBool,
}

impl Shared {
    /// Publish an event, honoring the broadcasting switch.
    pub(crate) fn publish(&self, event: RegistryEvent) {
        if self.config.enable_event_broadcasting {
            self.bus.publish(event);
        }
    }
}

/// Central coordination point for agent registration, discovery, and
/// health tracking.
///
/// A single instance is shared across caller tasks (wrap it in an [`Arc`]);
/// all operations take `&self`.
pub struct AgentRegistry {
    shared: Arc<Shared>,
    shutdown_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl AgentRegistry {
    /// Create a registry with the given configuration.
    ///
    /// Background tasks do not run until [`start`](Self::start) is called.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let bus = EventBus::new(config.event_queue_size, config.overflow_policy);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(RegistryState {
                    store: AgentStore::new(),
                    runtimes: RuntimeTracker::new(),
                }),
                bus,
                closed: AtomicBool::new(false),
            }),
            shutdown_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Start the event dispatcher and health monitor (as enabled by
    /// configuration). Idempotent.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("registry already started");
            return;
        }
        let mut tasks = self.tasks.lock().await;
        if self.shared.config.enable_event_broadcasting {
            let shared = Arc::clone(&self.shared);
            let token = self.shutdown_token.clone();
            tasks.push(tokio::spawn(async move { shared.bus.run(token).await }));
        }
        if self.shared.config.enable_heartbeat_monitoring {
            let shared = Arc::clone(&self.shared);
            let token = self.shutdown_token.clone();
            tasks.push(tokio::spawn(monitor::run(shared, token)));
        }
        info!("agent registry started");
    }

    /// Stop accepting mutating calls and new events, cancel the background
    /// tasks, and wait for them to finish. The dispatcher drains queued
    /// events before exiting. Idempotent.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!("shutdown already initiated");
            return;
        }
        info!("agent registry shutting down");
        self.shared.bus.close();
        self.shutdown_token.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("background task ended abnormally: {e}");
            }
        }
        info!("agent registry stopped");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            Err(Error::ShutdownInProgress)
        } else {
            Ok(())
        }
    }

    /// Register an agent and return its new unique id.
    ///
    /// Publishes `agent_registered`, preceded by `runtime_joined` when this
    /// is the runtime's first agent.
    pub async fn register_agent(
        &self,
        handle: AgentHandle,
        runtime_id: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Result<Uuid> {
        self.ensure_open()?;
        let runtime_id = runtime_id.into();
        let record = AgentRecord::new(handle, runtime_id.clone(), capabilities);
        let agent_id = record.agent_id;

        let mut state = self.shared.state.write().await;
        state.store.insert(record)?;
        let joined = state.runtimes.add(&runtime_id, agent_id);
        if joined {
            self.shared.publish(RegistryEvent::runtime(
                RegistryEventKind::RuntimeJoined,
                &runtime_id,
            ));
        }
        self.shared.publish(RegistryEvent::agent(
            RegistryEventKind::AgentRegistered,
            agent_id,
            &runtime_id,
        ));
        debug!(%agent_id, %runtime_id, "agent registered");
        Ok(agent_id)
    }

    /// Deregister an agent.
    ///
    /// Returns [`Error::NotFound`] when the agent is unknown — including a
    /// second deregister of the same agent — or when `runtime_id` does not
    /// match the record's owning runtime. Publishes `agent_deregistered`
    /// with `reason = "caller"` (monitor-driven eviction uses
    /// `reason = "timeout"`), plus `runtime_left` when this was the
    /// runtime's last agent.
    pub async fn deregister_agent(&self, agent_id: Uuid, runtime_id: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.shared.state.write().await;
        match state.store.get(agent_id) {
            Some(record) if record.runtime_id == runtime_id => {}
            _ => return Err(Error::NotFound { agent_id }),
        }
        let record = state.store.remove(agent_id)?;
        let left = state.runtimes.remove(&record.runtime_id, agent_id);
        self.shared
            .publish(RegistryEvent::deregistered(agent_id, &record.runtime_id, "caller"));
        if left {
            self.shared.publish(RegistryEvent::runtime(
                RegistryEventKind::RuntimeLeft,
                &record.runtime_id,
            ));
        }
        debug!(%agent_id, runtime_id = %record.runtime_id, "agent deregistered");
        Ok(())
    }

    /// Record a heartbeat for an agent.
    ///
    /// Updates `last_heartbeat` and promotes an unhealthy agent back to
    /// active (degraded/offline are caller-driven and are not auto-promoted).
    /// Publishes `agent_heartbeat`.
    pub async fn update_agent_heartbeat(&self, agent_id: Uuid) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.shared.state.write().await;
        let record = state
            .store
            .get_mut(agent_id)
            .ok_or(Error::NotFound { agent_id })?;
        record.last_heartbeat = Utc::now();
        let runtime_id = record.runtime_id.clone();
        if record.status == AgentStatus::Unhealthy {
            record.status = AgentStatus::Active;
            self.shared.publish(RegistryEvent::status_change(
                agent_id,
                &runtime_id,
                AgentStatus::Unhealthy,
                AgentStatus::Active,
                "heartbeat",
            ));
        }
        self.shared.publish(RegistryEvent::agent(
            RegistryEventKind::AgentHeartbeat,
            agent_id,
            &runtime_id,
        ));
        Ok(())
    }

    /// Set an agent's status.
    ///
    /// Setting the current status again is a no-op and emits nothing;
    /// otherwise publishes `agent_status_changed` with the old and new
    /// statuses in metadata.
    pub async fn update_agent_status(&self, agent_id: Uuid, status: AgentStatus) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.shared.state.write().await;
        let record = state
            .store
            .get_mut(agent_id)
            .ok_or(Error::NotFound { agent_id })?;
        let old_status = record.status;
        if old_status == status {
            return Ok(());
        }
        record.status = status;
        let runtime_id = record.runtime_id.clone();
        self.shared.publish(RegistryEvent::status_change(
            agent_id,
            &runtime_id,
            old_status,
            status,
            "caller",
        ));
        debug!(%agent_id, %old_status, new_status = %status, "agent status updated");
        Ok(())
    }

    /// Find agents whose any capability contains `query` as a
    /// case-insensitive substring, optionally restricted to a status.
    ///
    /// Snapshot-consistent; results are sorted by agent id.
    pub async fn find_agents_by_capability(
        &self,
        query: &str,
        status_filter: Option<AgentStatus>,
    ) -> Vec<AgentRecord> {
        let state = self.shared.state.read().await;
        state.store.find_by_capability(query, status_filter)
    }

    /// Fetch a single agent record.
    pub async fn get_agent(&self, agent_id: Uuid) -> Result<AgentRecord> {
        let state = self.shared.state.read().await;
        state
            .store
            .get(agent_id)
            .cloned()
            .ok_or(Error::NotFound { agent_id })
    }

    /// Summaries of all registered agents, sorted by agent id.
    pub async fn list_agents(&self) -> Vec<AgentSummary> {
        let state = self.shared.state.read().await;
        let mut summaries: Vec<AgentSummary> =
            state.store.iter().map(AgentSummary::from).collect();
        summaries.sort_by_key(|summary| summary.agent_id);
        summaries
    }

    /// Number of registered agents.
    pub async fn agent_count(&self) -> usize {
        self.shared.state.read().await.store.len()
    }

    /// Ids of the agents registered from a runtime, sorted.
    pub async fn runtime_agents(&self, runtime_id: &str) -> Vec<Uuid> {
        let state = self.shared.state.read().await;
        let mut agents: Vec<Uuid> = state
            .runtimes
            .agents_of(runtime_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        agents.sort();
        agents
    }

    /// Number of runtimes with at least one registered agent.
    pub async fn runtime_count(&self) -> usize {
        self.shared.state.read().await.runtimes.runtime_count()
    }

    /// Subscribe to registry events.
    ///
    /// `filter = Some(kind)` restricts delivery to one event kind; `None`
    /// receives every event.
    pub async fn subscribe(
        &self,
        filter: Option<RegistryEventKind>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> SubscriptionId {
        self.shared.bus.subscribe(filter, subscriber).await
    }

    /// Remove a subscription. Returns `false` if the id was unknown.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(id).await
    }

    /// Run one health-check pass immediately, independent of the periodic
    /// monitor. Useful when heartbeat monitoring is disabled.
    pub async fn run_health_check(&self) {
        monitor::sweep(&self.shared, Utc::now()).await;
    }

    /// Number of events dropped so far due to queue overflow (or publishes
    /// after shutdown).
    pub fn dropped_events(&self) -> u64 {
        self.shared.bus.dropped_events()
    }
}

#[cfg(test)]
mod tests;
