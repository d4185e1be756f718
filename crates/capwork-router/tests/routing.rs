use capwork_core::{
    AgentId, AgentProfile, AgentStatus, Capability, CapworkConfig, DispatchError, Task, TaskId,
    TaskStatus,
};
use capwork_registry::CapabilityRegistry;
use capwork_router::TaskRouter;
use std::sync::Arc;

fn single_agent_router(limit: u32) -> TaskRouter {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register_agent(AgentProfile::new("dev-1").with_wip_limit(limit));
    registry
        .add_capability(Capability::new("dev-1", "Web:React", 4))
        .unwrap();
    TaskRouter::with_defaults(registry)
}

#[test]
fn fourth_task_queues_once_agent_is_saturated() {
    let router = single_agent_router(3);
    let agent = AgentId::from("dev-1");

    for i in 0..3 {
        let assigned = router.assign_task(Task::new(format!("t{}", i), "Web:React")).unwrap();
        assert_eq!(assigned, agent);
    }

    let err = router.assign_task(Task::new("t3", "Web:React")).unwrap_err();
    assert!(matches!(err, DispatchError::TaskQueued { .. }));
    assert_eq!(router.get_queue_depth(None), 1);
    assert_eq!(router.registry().get_agent(&agent).unwrap().current_wip, 3);
    assert_eq!(router.get_agent_tasks(&agent).len(), 3);
}

#[test]
fn completion_frees_one_slot_and_drains_the_queue() {
    let router = single_agent_router(3);
    for i in 0..4 {
        let _ = router.assign_task(Task::new(format!("t{}", i), "Web:React"));
    }
    assert_eq!(router.get_queue_depth(Some("Web:React")), 1);

    router.complete_task(&"t0".into()).unwrap();

    assert_eq!(router.get_queue_depth(Some("Web:React")), 0);
    let agent = AgentId::from("dev-1");
    assert_eq!(router.registry().get_agent(&agent).unwrap().current_wip, 3);
    assert_eq!(
        router.get_task(&"t3".into()).unwrap().assigned_agent,
        Some(agent.clone())
    );
    assert_eq!(
        router.get_agent_tasks(&agent),
        vec![TaskId::from("t1"), TaskId::from("t2"), TaskId::from("t3")]
    );
}

#[test]
fn completing_unknown_task_is_a_no_op() {
    let router = single_agent_router(3);
    assert!(router.complete_task(&"nonexistent".into()).is_none());
    assert_eq!(router.stats().completed_total, 0);
}

#[test]
fn drain_preserves_fifo_order() {
    let router = single_agent_router(1);
    router.assign_task(Task::new("blocker", "Web:React")).unwrap();
    for id in ["T0", "T1", "T2"] {
        let _ = router.assign_task(Task::new(id, "Web:React"));
    }

    let mut order = Vec::new();
    let mut current = TaskId::from("blocker");
    for _ in 0..3 {
        router.complete_task(&current);
        current = router.get_agent_tasks(&"dev-1".into())[0].clone();
        order.push(current.clone());
    }
    assert_eq!(
        order,
        vec![TaskId::from("T0"), TaskId::from("T1"), TaskId::from("T2")]
    );
}

#[test]
fn drain_stops_when_capacity_runs_out_again() {
    let router = single_agent_router(1);
    router.assign_task(Task::new("t0", "Web:React")).unwrap();
    for id in ["t1", "t2", "t3"] {
        let _ = router.assign_task(Task::new(id, "Web:React"));
    }

    router.complete_task(&"t0".into());
    assert_eq!(router.get_queue_depth(None), 2);
    assert_eq!(
        router.get_task(&"t2".into()).unwrap().status,
        TaskStatus::Queued
    );
}

#[test]
fn backpressure_threshold_is_inclusive() {
    let router = single_agent_router(3);
    for i in 0..9 {
        let err = router.assign_task(Task::new(format!("q{}", i), "Rust:Async")).unwrap_err();
        assert!(matches!(err, DispatchError::NoAgentAvailable { .. }));
    }
    assert_eq!(router.get_queue_depth(None), 9);
    assert!(!router.is_backpressure_active());

    let _ = router.assign_task(Task::new("q9", "Rust:Async"));
    assert!(router.is_backpressure_active());

    // still accepted past the threshold
    let _ = router.assign_task(Task::new("q10", "Rust:Async"));
    assert_eq!(router.get_queue_depth(Some("Rust:Async")), 11);
    assert_eq!(router.metrics().backpressure_active.get(), 1);
}

#[test]
fn hierarchical_match_routes_specialist_work_to_generalist() {
    let router = single_agent_router(3);
    let agent = router.assign_task(Task::new("hooks", "Web:React:Hooks")).unwrap();
    assert_eq!(agent.as_str(), "dev-1");
}

#[test]
fn reassign_moves_task_to_another_agent() {
    let registry = Arc::new(CapabilityRegistry::new());
    for (id, p) in [("alice", 5), ("bob", 4)] {
        registry.register_agent(AgentProfile::new(id));
        registry.add_capability(Capability::new(id, "Go", p)).unwrap();
    }
    let router = TaskRouter::with_defaults(registry);

    assert_eq!(router.assign_task(Task::new("t1", "Go")).unwrap().as_str(), "alice");
    let moved = router.reassign_task(&"t1".into(), None).unwrap();
    assert_eq!(moved.as_str(), "bob");

    let alice = router.registry().get_agent(&"alice".into()).unwrap();
    assert_eq!(alice.current_wip, 0);
    assert!(router.get_agent_tasks(&"alice".into()).is_empty());
    assert_eq!(router.get_agent_tasks(&"bob".into()), vec![TaskId::from("t1")]);
    assert_eq!(
        router.get_assignment(&"t1".into()).unwrap().agent_id.as_str(),
        "bob"
    );
}

#[test]
fn reassign_with_explicit_exclusion() {
    let registry = Arc::new(CapabilityRegistry::new());
    for (id, p) in [("alice", 5), ("bob", 4), ("carol", 3)] {
        registry.register_agent(AgentProfile::new(id));
        registry.add_capability(Capability::new(id, "Go", p)).unwrap();
    }
    let router = TaskRouter::with_defaults(registry);
    router.assign_task(Task::new("t1", "Go")).unwrap();

    // excluding bob instead of the current agent lets alice keep the task
    let agent = router
        .reassign_task(&"t1".into(), Some(&"bob".into()))
        .unwrap();
    assert_eq!(agent.as_str(), "alice");
    assert_eq!(router.stats().reassigned_total, 1);
}

#[test]
fn reassign_without_alternative_queues() {
    let router = single_agent_router(3);
    router.assign_task(Task::new("t1", "Web:React")).unwrap();

    let err = router.reassign_task(&"t1".into(), None).unwrap_err();
    assert!(matches!(err, DispatchError::TaskQueued { .. }));
    assert_eq!(router.get_queue_depth(Some("Web:React")), 1);
    assert_eq!(
        router.get_task(&"t1".into()).unwrap().status,
        TaskStatus::Queued
    );
    assert_eq!(
        router.registry().get_agent(&"dev-1".into()).unwrap().current_wip,
        0
    );
}

#[test]
fn reassign_unknown_task_is_not_found() {
    let router = single_agent_router(3);
    let err = router.reassign_task(&"never".into(), None).unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(_)));
}

#[test]
fn unknown_agent_has_no_tasks() {
    let router = single_agent_router(3);
    assert!(router.get_agent_tasks(&"nobody".into()).is_empty());
}

#[test]
fn new_agents_pick_up_waiting_work_on_drain() {
    let router = single_agent_router(3);
    let _ = router.assign_task(Task::new("py", "Python"));
    assert_eq!(router.get_queue_depth(Some("Python")), 1);

    router.register_agent(AgentProfile::new("py-dev"));
    router
        .add_capability(Capability::new("py-dev", "Python", 4))
        .unwrap();
    assert_eq!(router.drain_all(), 1);
    assert_eq!(router.get_agent_tasks(&"py-dev".into()), vec![TaskId::from("py")]);
}

#[test]
fn offline_agents_are_claimable_when_skipping_is_disabled() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry.register_agent(AgentProfile::new("off").with_status(AgentStatus::Offline));
    registry.add_capability(Capability::new("off", "Go", 5)).unwrap();
    let mut config = CapworkConfig::default();
    config.routing.skip_offline_agents = false;
    let router = TaskRouter::new(registry, &config);

    let ranked = router.match_candidates(&["Go"], 3);
    assert_eq!(ranked[0].availability_score, 0.0);
    assert_eq!(router.assign_task(Task::new("t1", "Go")).unwrap().as_str(), "off");
}

#[test]
fn task_context_is_carried_untouched() {
    let router = single_agent_router(3);
    let ctx = serde_json::json!({"repo": "web", "files": ["a.tsx"]});
    router
        .assign_task(Task::new("t1", "Web:React").with_context(ctx.clone()))
        .unwrap();
    assert_eq!(router.get_task(&"t1".into()).unwrap().context, ctx);
}
