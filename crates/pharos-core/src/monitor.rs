//! Health monitoring — stale-heartbeat detection and timeout eviction.
//!
//! The monitor's only tool is time-based eviction: there is no active
//! probing of the agent handle, so a crashed agent is indistinguishable
//! from a slow one. Callers that get falsely evicted are expected to
//! re-register on reconnect.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event_bus::{RegistryEvent, RegistryEventKind};
use crate::record::AgentStatus;
use crate::registry::Shared;

/// Periodic liveness loop; runs a sweep every tick until cancelled.
pub(crate) async fn run(shared: Arc<Shared>, shutdown: CancellationToken) {
    let interval = shared.config.monitor_interval();
    info!(interval_ms = interval.as_millis() as u64, "health monitor started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                sweep(&shared, Utc::now()).await;
            }
            _ = shutdown.cancelled() => {
                info!("health monitor stopped");
                break;
            }
        }
    }
}

/// One liveness pass over the store at time `now`.
///
/// Pass 1: active agents past the heartbeat timeout become unhealthy.
/// Pass 2: non-active agents past the deregistration timeout (measured from
/// the last heartbeat, not from the unhealthy transition) are evicted.
/// Degraded/offline agents are caller-driven states and are never
/// transitioned here, but they still age toward eviction.
pub(crate) async fn sweep(shared: &Shared, now: DateTime<Utc>) {
    let heartbeat_timeout = Duration::seconds(shared.config.heartbeat_timeout_secs as i64);
    let deregister_timeout =
        Duration::seconds(shared.config.auto_deregister_timeout_secs as i64);

    let mut state = shared.state.write().await;

    let stale: Vec<Uuid> = state
        .store
        .iter()
        .filter(|record| {
            record.status == AgentStatus::Active
                && now - record.last_heartbeat > heartbeat_timeout
        })
        .map(|record| record.agent_id)
        .collect();
    for agent_id in stale {
        if let Some(record) = state.store.get_mut(agent_id) {
            record.status = AgentStatus::Unhealthy;
            let runtime_id = record.runtime_id.clone();
            warn!(%agent_id, %runtime_id, "agent missed heartbeat window, marking unhealthy");
            shared.publish(RegistryEvent::status_change(
                agent_id,
                &runtime_id,
                AgentStatus::Active,
                AgentStatus::Unhealthy,
                "heartbeat_timeout",
            ));
        }
    }

    let expired: Vec<Uuid> = state
        .store
        .iter()
        .filter(|record| {
            record.status != AgentStatus::Active
                && now - record.last_heartbeat > deregister_timeout
        })
        .map(|record| record.agent_id)
        .collect();
    for agent_id in expired {
        if let Ok(record) = state.store.remove(agent_id) {
            let runtime_left = state.runtimes.remove(&record.runtime_id, agent_id);
            warn!(
                %agent_id,
                runtime_id = %record.runtime_id,
                "agent heartbeat expired, auto-deregistering"
            );
            shared.publish(RegistryEvent::deregistered(
                agent_id,
                &record.runtime_id,
                "timeout",
            ));
            if runtime_left {
                shared.publish(RegistryEvent::runtime(
                    RegistryEventKind::RuntimeLeft,
                    &record.runtime_id,
                ));
            }
        }
    }
}
