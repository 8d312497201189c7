//! End-to-end scheduler scenarios: install, scale, update, leadership,
//! cache behavior, and the plan lifecycle, all against one service.

use std::collections::HashMap;

use stevedore_core::config::ServiceConfig;
use stevedore_core::types::TaskState;
use stevedore_plan::{DECOMMISSION, DEPLOY, Status};
use stevedore_scheduler::{LAST_COMPLETED_UPDATE_TYPE, SUPPRESSED, SchedulerError, SchedulerState};
use stevedore_state::{StateError, StateStore};

fn config(vars: &[(&str, &str)]) -> ServiceConfig {
    let map: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    ServiceConfig::from_vars(&map).unwrap()
}

/// Register with the given environment and drive every plan to its
/// resting state.
fn deploy(store: &StateStore, vars: &[(&str, &str)]) -> SchedulerState {
    let mut state = SchedulerState::register(config(vars), store.clone()).unwrap();
    state.run_to_completion().unwrap();
    state
}

fn task_id(state: &SchedulerState, instance: &str) -> String {
    state.instance_status(instance).unwrap().tasks[0].id.clone()
}

#[test]
fn install_starts_the_declared_topology() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);

    assert_eq!(state.instance_names(), vec!["hello-0", "world-0", "world-1"]);
    for instance in ["hello-0", "world-0", "world-1"] {
        let status = state.instance_status(instance).unwrap();
        assert_eq!(status.tasks.len(), 1);
        assert_eq!(status.tasks[0].status, "RUNNING");
        assert_eq!(status.tasks[0].name, format!("{instance}-server"));
    }

    // One framework id, assigned at first registration.
    state.framework_id().unwrap();

    // Properties: a task-status key per instance plus the bookkeeping
    // pair, in sorted order.
    let keys = state.properties().unwrap();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    for instance in ["hello-0", "world-0", "world-1"] {
        assert!(keys.contains(&format!("{instance}-server:task-status")));
        assert_eq!(
            state.property(&format!("{instance}-server:task-status")).unwrap(),
            b"TASK_RUNNING"
        );
    }
    assert_eq!(state.property(LAST_COMPLETED_UPDATE_TYPE).unwrap(), b"deploy");
    assert_eq!(state.property(SUPPRESSED).unwrap(), b"true");
}

#[test]
fn task_ids_embed_the_sanitized_service_name() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[("SERVICE_NAME", "/test/integration/hello-world")]);

    let id = task_id(&state, "world-0");
    assert!(id.starts_with("test.integration.hello-world__world-0-server__"));
}

#[test]
fn scale_up_and_down_round_trip_preserves_survivors() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);
    let original: Vec<String> = ["hello-0", "world-0", "world-1"]
        .iter()
        .map(|i| task_id(&state, i))
        .collect();
    drop(state);

    // Scale world up to 4: the original three tasks are untouched.
    let state = deploy(&store, &[("WORLD_COUNT", "4")]);
    assert_eq!(
        state.instance_names(),
        vec!["hello-0", "world-0", "world-1", "world-2", "world-3"]
    );
    for (i, instance) in ["hello-0", "world-0", "world-1"].iter().enumerate() {
        assert_eq!(task_id(&state, instance), original[i]);
    }
    let scaled_up: Vec<String> =
        ["world-2", "world-3"].iter().map(|i| task_id(&state, i)).collect();
    assert!(scaled_up.iter().all(|id| !original.contains(id)));
    drop(state);

    // Scale back down: world-2/3 are decommissioned, survivors keep
    // their uuids.
    let state = deploy(&store, &[("WORLD_COUNT", "2")]);
    assert_eq!(state.instance_names(), vec!["hello-0", "world-0", "world-1"]);
    for (i, instance) in ["hello-0", "world-0", "world-1"].iter().enumerate() {
        assert_eq!(task_id(&state, instance), original[i]);
    }
    assert_eq!(state.property(LAST_COMPLETED_UPDATE_TYPE).unwrap(), b"decommission");
}

#[test]
fn decommissioned_instances_keep_their_properties() {
    let store = StateStore::open_in_memory().unwrap();
    deploy(&store, &[("WORLD_COUNT", "4")]);
    let state = deploy(&store, &[("WORLD_COUNT", "2")]);

    // The task records are gone but the property trail remains.
    let keys = state.properties().unwrap();
    for instance in ["world-2", "world-3"] {
        let key = format!("{instance}-server:task-status");
        assert!(keys.contains(&key));
        assert_eq!(state.property(&key).unwrap(), b"TASK_KILLED");
        assert!(store.get_task(instance).unwrap().is_none());
    }
}

#[test]
fn decommission_plan_kills_highest_indices_first() {
    let store = StateStore::open_in_memory().unwrap();
    deploy(&store, &[("WORLD_COUNT", "4")]);
    let state = deploy(&store, &[("WORLD_COUNT", "2")]);

    let plan = state.plan(DECOMMISSION).unwrap();
    assert!(plan.is_complete());
    let instances: Vec<&str> =
        plan.phases[0].steps.iter().map(|s| s.instance.as_str()).collect();
    assert_eq!(instances, vec!["world-3", "world-2"]);
}

#[test]
fn cpu_bump_relaunches_only_the_affected_pod() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);
    let hello_before = task_id(&state, "hello-0");
    let world_before: Vec<String> =
        ["world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    drop(state);

    let state = deploy(&store, &[("HELLO_CPUS", "0.2")]);
    // hello-0 was relaunched under a new uuid; world is untouched.
    assert_ne!(task_id(&state, "hello-0"), hello_before);
    let world_after: Vec<String> =
        ["world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    assert_eq!(world_after, world_before);
}

#[test]
fn unchanged_redeploy_is_a_no_op() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);
    let ids: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    let target = state.target_id().unwrap();
    drop(state);

    let state = deploy(&store, &[]);
    assert_eq!(state.target_id().unwrap(), target);
    assert_eq!(state.config_ids().unwrap().len(), 1);
    let after: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    assert_eq!(after, ids);
}

#[test]
fn contender_leaves_no_trace_in_the_store() {
    let store = StateStore::open_in_memory().unwrap();
    let leader = deploy(&store, &[]);
    let before = store.target_bytes().unwrap();

    // A second scheduler, even with a different topology, fails at the
    // lock and writes nothing.
    let err = SchedulerState::register(config(&[("WORLD_COUNT", "9")]), store.clone()).unwrap_err();
    assert!(matches!(err, SchedulerError::State(StateError::LockContended { .. })));

    // The target node is byte-identical.
    assert_eq!(store.target_bytes().unwrap(), before);
    assert_eq!(store.list_config_ids().unwrap().len(), 1);
    drop(leader);
}

#[test]
fn cache_refresh_acknowledged_when_enabled() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);

    state.refresh_cache().unwrap();
    // A write bypassing the cache becomes visible after refresh.
    store.set_property("out-of-band", b"x").unwrap();
    assert!(matches!(
        state.property("out-of-band"),
        Err(SchedulerError::PropertyNotFound(_))
    ));
    state.refresh_cache().unwrap();
    assert_eq!(state.property("out-of-band").unwrap(), b"x");
}

#[test]
fn cache_refresh_conflicts_when_disabled() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[("DISABLE_STATE_CACHE", "")]);

    let err = state.refresh_cache().unwrap_err();
    assert!(err.to_string().contains("409 Conflict"));

    // Everything else still works; task identities are unaffected.
    assert_eq!(state.instance_status("hello-0").unwrap().tasks[0].status, "RUNNING");
}

#[test]
fn cache_toggle_does_not_relaunch_tasks() {
    let store = StateStore::open_in_memory().unwrap();
    let state = deploy(&store, &[]);
    let ids: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    drop(state);

    let state = deploy(&store, &[("DISABLE_STATE_CACHE", "")]);
    let after: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    assert_eq!(after, ids);
}

#[test]
fn plan_lifecycle_interrupt_continue_force_restart() {
    let store = StateStore::open_in_memory().unwrap();
    let mut state = deploy(&store, &[]);
    let ids: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();

    // Interrupting a completed plan is rejected.
    let err = state.interrupt_plan(DEPLOY, "world").unwrap_err();
    assert!(matches!(err, SchedulerError::Plan(_)));

    // Force-restart re-arms the plan; interrupt the world phase before
    // letting it run.
    state.force_restart_plan(DEPLOY).unwrap();
    assert_eq!(state.plan(DEPLOY).unwrap().status(), Status::Pending);
    state.interrupt_plan(DEPLOY, "world").unwrap();

    state.run_to_completion().unwrap();
    let plan = state.plan(DEPLOY).unwrap();
    assert!(plan.phase("hello").unwrap().status().is_complete());
    assert_eq!(plan.phase("world").unwrap().status(), Status::Waiting);
    assert_eq!(plan.status(), Status::Waiting);

    state.continue_plan(DEPLOY, "world").unwrap();
    state.run_to_completion().unwrap();
    assert!(state.plan(DEPLOY).unwrap().is_complete());

    // The whole cycle never replaced a satisfied task.
    let after: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    assert_eq!(after, ids);
}

#[test]
fn plan_mutations_are_durable_across_processes() {
    let store = StateStore::open_in_memory().unwrap();
    {
        let mut state = deploy(&store, &[]);
        state.force_restart_plan(DEPLOY).unwrap();
    }

    // A fresh attach (as the CLI would do) observes the restarted plan.
    let attached = SchedulerState::attach(config(&[]), store.clone()).unwrap();
    assert_eq!(attached.plan(DEPLOY).unwrap().status(), Status::Pending);

    // The next scheduler run picks it up and drives it back to COMPLETE.
    let state = deploy(&store, &[]);
    assert!(state.plan(DEPLOY).unwrap().is_complete());
}

#[test]
fn failed_task_recovers_with_a_new_uuid() {
    let store = StateStore::open_in_memory().unwrap();
    let mut state = deploy(&store, &[]);
    let before = task_id(&state, "world-1");

    state.handle_task_status("world-1", TaskState::Failed).unwrap();
    assert_eq!(
        state.property("world-1-server:task-status").unwrap(),
        b"TASK_FAILED"
    );

    state.run_to_completion().unwrap();
    assert_ne!(task_id(&state, "world-1"), before);
    assert_eq!(
        state.property("world-1-server:task-status").unwrap(),
        b"TASK_RUNNING"
    );
    // The other instances were not disturbed.
    assert_eq!(state.instance_status("world-0").unwrap().tasks[0].status, "RUNNING");
}

#[test]
fn persistent_store_survives_scheduler_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stevedore.redb");

    let ids: Vec<String> = {
        let store = StateStore::open(&path).unwrap();
        let state = deploy(&store, &[]);
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect()
    };

    let store = StateStore::open(&path).unwrap();
    let state = deploy(&store, &[]);
    let after: Vec<String> =
        ["hello-0", "world-0", "world-1"].iter().map(|i| task_id(&state, i)).collect();
    assert_eq!(after, ids);
}
