use super::*;
use chrono::Duration as ChronoDuration;
use std::sync::Mutex as StdMutex;

/// Test subscriber that records every event it sees.
#[derive(Default)]
struct Recorder {
    seen: StdMutex<Vec<RegistryEvent>>,
}

#[async_trait::async_trait]
impl EventSubscriber for Recorder {
    async fn on_event(&self, event: RegistryEvent) {
        self.seen.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn kinds(&self) -> Vec<RegistryEventKind> {
        self.seen.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

fn handle() -> AgentHandle {
    Arc::new(())
}

fn caps(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

/// Registry with background monitoring off; tests drive sweeps directly.
fn test_registry() -> AgentRegistry {
    AgentRegistry::new(
        RegistryConfig::new()
            .with_heartbeat_timeout(1)
            .with_auto_deregister_timeout(3)
            .with_heartbeat_monitoring(false),
    )
    .unwrap()
}

/// Pretend the agent last heartbeated `ms` milliseconds ago.
async fn backdate_heartbeat(registry: &AgentRegistry, agent_id: Uuid, ms: i64) {
    let mut state = registry.shared.state.write().await;
    let record = state.store.get_mut(agent_id).unwrap();
    record.last_heartbeat = Utc::now() - ChronoDuration::milliseconds(ms);
}

#[tokio::test]
async fn test_register_and_get() {
    let registry = test_registry();
    let agent_id = registry
        .register_agent(handle(), "r1", caps(&["code generation"]))
        .await
        .unwrap();

    let record = registry.get_agent(agent_id).await.unwrap();
    assert_eq!(record.runtime_id, "r1");
    assert_eq!(record.status, AgentStatus::Active);
    assert_eq!(registry.agent_count().await, 1);
    assert_eq!(registry.runtime_count().await, 1);
}

#[tokio::test]
async fn test_scenario_a_discovery_and_runtime_set() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["code generation"]))
        .await
        .unwrap();
    let a2 = registry
        .register_agent(handle(), "r1", caps(&["data analysis"]))
        .await
        .unwrap();

    let found = registry.find_agents_by_capability("code", None).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].agent_id, a1);

    let members = registry.runtime_agents("r1").await;
    assert_eq!(members.len(), 2);
    assert!(members.contains(&a1) && members.contains(&a2));
}

#[tokio::test]
async fn test_scenario_b_deregister_and_runtime_left() {
    let registry = test_registry();
    let recorder = Arc::new(Recorder::default());
    registry.subscribe(None, recorder.clone()).await;
    registry.start().await;

    let a1 = registry
        .register_agent(handle(), "r1", caps(&["code generation"]))
        .await
        .unwrap();
    registry.deregister_agent(a1, "r1").await.unwrap();
    assert_eq!(registry.runtime_count().await, 0);
    assert!(registry.runtime_agents("r1").await.is_empty());

    // Second deregister of the same agent: consistently NotFound.
    let result = registry.deregister_agent(a1, "r1").await;
    assert!(matches!(result, Err(Error::NotFound { agent_id }) if agent_id == a1));

    registry.shutdown().await;
    assert_eq!(
        recorder.kinds(),
        vec![
            RegistryEventKind::RuntimeJoined,
            RegistryEventKind::AgentRegistered,
            RegistryEventKind::AgentDeregistered,
            RegistryEventKind::RuntimeLeft,
        ]
    );
}

#[tokio::test]
async fn test_scenario_c_timeout_state_machine() {
    let registry = test_registry();
    let recorder = Arc::new(Recorder::default());
    registry
        .subscribe(Some(RegistryEventKind::AgentDeregistered), recorder.clone())
        .await;
    registry.start().await;

    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();

    // 1.5s since last heartbeat: past the 1s heartbeat timeout.
    backdate_heartbeat(&registry, a1, 1500).await;
    registry.run_health_check().await;
    assert_eq!(
        registry.get_agent(a1).await.unwrap().status,
        AgentStatus::Unhealthy
    );

    // 3.5s since last heartbeat: past the 3s deregistration timeout.
    backdate_heartbeat(&registry, a1, 3500).await;
    registry.run_health_check().await;
    assert!(matches!(
        registry.get_agent(a1).await,
        Err(Error::NotFound { .. })
    ));
    assert_eq!(registry.agent_count().await, 0);
    assert_eq!(registry.runtime_count().await, 0);

    registry.shutdown().await;
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one deregistration event");
    assert_eq!(seen[0].metadata["reason"], "timeout");
}

#[tokio::test]
async fn test_heartbeat_promotes_unhealthy() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();

    backdate_heartbeat(&registry, a1, 1500).await;
    registry.run_health_check().await;
    assert_eq!(
        registry.get_agent(a1).await.unwrap().status,
        AgentStatus::Unhealthy
    );

    registry.update_agent_heartbeat(a1).await.unwrap();
    let record = registry.get_agent(a1).await.unwrap();
    assert_eq!(record.status, AgentStatus::Active);
    assert!(Utc::now() - record.last_heartbeat < ChronoDuration::seconds(1));
}

#[tokio::test]
async fn test_heartbeat_does_not_promote_degraded_or_offline() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    registry
        .update_agent_status(a1, AgentStatus::Degraded)
        .await
        .unwrap();

    registry.update_agent_heartbeat(a1).await.unwrap();
    assert_eq!(
        registry.get_agent(a1).await.unwrap().status,
        AgentStatus::Degraded
    );

    // The sweep never touches caller-driven states either.
    backdate_heartbeat(&registry, a1, 1500).await;
    registry.run_health_check().await;
    assert_eq!(
        registry.get_agent(a1).await.unwrap().status,
        AgentStatus::Degraded
    );
}

#[tokio::test]
async fn test_degraded_agent_still_ages_toward_eviction() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    registry
        .update_agent_status(a1, AgentStatus::Offline)
        .await
        .unwrap();

    backdate_heartbeat(&registry, a1, 3500).await;
    registry.run_health_check().await;
    assert!(matches!(
        registry.get_agent(a1).await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_update_status_events_and_noop() {
    let registry = test_registry();
    let recorder = Arc::new(Recorder::default());
    registry
        .subscribe(Some(RegistryEventKind::AgentStatusChanged), recorder.clone())
        .await;
    registry.start().await;

    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    registry
        .update_agent_status(a1, AgentStatus::Degraded)
        .await
        .unwrap();
    // Same status again: no event.
    registry
        .update_agent_status(a1, AgentStatus::Degraded)
        .await
        .unwrap();

    registry.shutdown().await;
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].metadata["old_status"], "active");
    assert_eq!(seen[0].metadata["new_status"], "degraded");
}

#[tokio::test]
async fn test_status_filter_excludes_unhealthy() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["Python code generation"]))
        .await
        .unwrap();

    backdate_heartbeat(&registry, a1, 1500).await;
    registry.run_health_check().await;

    assert!(registry
        .find_agents_by_capability("python", Some(AgentStatus::Active))
        .await
        .is_empty());
    assert_eq!(
        registry
            .find_agents_by_capability("python", None)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_deregister_wrong_runtime_is_not_found() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();

    let result = registry.deregister_agent(a1, "r2").await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
    assert_eq!(registry.agent_count().await, 1);
}

#[tokio::test]
async fn test_register_deregister_round_trip_restores_state() {
    let registry = test_registry();
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["code generation"]))
        .await
        .unwrap();
    registry.deregister_agent(a1, "r1").await.unwrap();

    let state = registry.shared.state.read().await;
    assert!(state.store.is_empty());
    assert!(state.store.index().is_empty());
    assert!(state.runtimes.is_empty());
}

#[tokio::test]
async fn test_runtime_set_matches_store() {
    let registry = test_registry();
    for runtime in ["r1", "r1", "r2", "r3", "r3", "r3"] {
        registry
            .register_agent(handle(), runtime, caps(&["search"]))
            .await
            .unwrap();
    }

    let state = registry.shared.state.read().await;
    for (runtime_id, agents) in state.runtimes.iter() {
        for agent_id in agents {
            assert_eq!(&state.store.get(*agent_id).unwrap().runtime_id, runtime_id);
        }
    }
    let tracked: usize = state.runtimes.iter().map(|(_, set)| set.len()).sum();
    assert_eq!(tracked, state.store.len());
}

#[tokio::test]
async fn test_per_agent_event_order() {
    let registry = test_registry();
    let recorder = Arc::new(Recorder::default());
    registry.subscribe(None, recorder.clone()).await;
    registry.start().await;

    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    registry.update_agent_heartbeat(a1).await.unwrap();
    registry.update_agent_heartbeat(a1).await.unwrap();
    registry.deregister_agent(a1, "r1").await.unwrap();
    registry.shutdown().await;

    let kinds: Vec<RegistryEventKind> = recorder
        .seen
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.agent_id == Some(a1))
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            RegistryEventKind::AgentRegistered,
            RegistryEventKind::AgentHeartbeat,
            RegistryEventKind::AgentHeartbeat,
            RegistryEventKind::AgentDeregistered,
        ]
    );
}

#[tokio::test]
async fn test_concurrent_registration_unique_ids() {
    let registry = Arc::new(test_registry());
    let mut handles = Vec::new();
    for i in 0..50 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .register_agent(handle(), format!("r{}", i % 5), caps(&["search"]))
                .await
                .unwrap()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for task in handles {
        assert!(ids.insert(task.await.unwrap()));
    }
    assert_eq!(ids.len(), 50);
    assert_eq!(registry.agent_count().await, 50);
    assert_eq!(registry.runtime_count().await, 5);
}

#[tokio::test]
async fn test_mutating_calls_fail_after_shutdown() {
    let registry = test_registry();
    registry.start().await;
    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();

    registry.shutdown().await;

    assert!(matches!(
        registry.register_agent(handle(), "r1", caps(&[])).await,
        Err(Error::ShutdownInProgress)
    ));
    assert!(matches!(
        registry.deregister_agent(a1, "r1").await,
        Err(Error::ShutdownInProgress)
    ));
    assert!(matches!(
        registry.update_agent_heartbeat(a1).await,
        Err(Error::ShutdownInProgress)
    ));
    assert!(matches!(
        registry
            .update_agent_status(a1, AgentStatus::Offline)
            .await,
        Err(Error::ShutdownInProgress)
    ));

    // Shutdown is idempotent.
    registry.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_unknown_agent() {
    let registry = test_registry();
    let result = registry.update_agent_heartbeat(Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn test_disabled_broadcasting_publishes_nothing() {
    let registry = AgentRegistry::new(
        RegistryConfig::new()
            .with_heartbeat_monitoring(false)
            .with_event_broadcasting(false),
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());
    registry.subscribe(None, recorder.clone()).await;
    registry.start().await;

    registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    registry.shutdown().await;

    assert!(recorder.seen.lock().unwrap().is_empty());
    assert_eq!(registry.dropped_events(), 0);
}

#[tokio::test]
async fn test_background_monitor_evicts() {
    // End-to-end: the spawned monitor loop does the work, no manual sweeps.
    let registry = AgentRegistry::new(
        RegistryConfig::new()
            .with_heartbeat_timeout(1)
            .with_auto_deregister_timeout(2)
            .with_monitor_interval(1),
    )
    .unwrap();
    registry.start().await;

    let a1 = registry
        .register_agent(handle(), "r1", caps(&["search"]))
        .await
        .unwrap();
    backdate_heartbeat(&registry, a1, 2500).await;

    // Give the monitor time for at least two ticks.
    tokio::time::sleep(std::time::Duration::from_millis(2200)).await;
    assert!(matches!(
        registry.get_agent(a1).await,
        Err(Error::NotFound { .. })
    ));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_rejected_at_construction() {
    let result = AgentRegistry::new(RegistryConfig::new().with_heartbeat_timeout(0));
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}
