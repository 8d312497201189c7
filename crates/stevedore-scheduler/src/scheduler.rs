//! SchedulerState — registration, plan execution, and the query surface.
//!
//! Registration acquires the leadership lock before touching any
//! persisted configuration, diffs the declared topology against the
//! stored target, and generates the deploy/decommission/recovery plans.
//! `tick` advances every eligible plan step one stage and performs the
//! task work attached to each stage transition. Plans are persisted
//! after every mutation so a separate process (the CLI) can observe and
//! operate on them.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use stevedore_core::config::ServiceConfig;
use stevedore_core::types::{Resources, TaskState, split_instance_name};
use stevedore_plan::{
    DECOMMISSION, DEPLOY, Plan, RECOVERY, Status, StepAction, decommission_plan, deploy_plan,
    recovery_plan,
};
use stevedore_state::{ConfigRecord, LeaderLock, StateCache, StateError, StateStore, TaskRecord};

use crate::error::{SchedulerError, SchedulerResult};
use crate::launcher::{LocalLauncher, TaskLauncher};
use crate::registry::{InstanceStatusView, PodRegistry, ServiceStatusView, TaskInfoView};

/// Property naming the most recently completed plan.
pub const LAST_COMPLETED_UPDATE_TYPE: &str = "last-completed-update-type";
/// Property set to `true` once every plan has run to completion.
pub const SUPPRESSED: &str = "suppressed";

/// The scheduler for one service: config, store, cache, registry, plans.
pub struct SchedulerState {
    config: ServiceConfig,
    store: StateStore,
    cache: StateCache,
    registry: PodRegistry,
    plans: BTreeMap<String, Plan>,
    launcher: Box<dyn TaskLauncher>,
    // Held for the lifetime of a registered scheduler; dropped on exit.
    lock: Option<LeaderLock>,
}

impl std::fmt::Debug for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerState")
            .field("service", &self.config.service_name)
            .finish_non_exhaustive()
    }
}

impl SchedulerState {
    /// Register the scheduler: acquire leadership, reconcile the declared
    /// topology against the persisted target, and build the plans.
    pub fn register(config: ServiceConfig, store: StateStore) -> SchedulerResult<Self> {
        Self::register_with(config, store, Box::new(LocalLauncher))
    }

    /// Register with an explicit task launcher.
    pub fn register_with(
        config: ServiceConfig,
        store: StateStore,
        launcher: Box<dyn TaskLauncher>,
    ) -> SchedulerResult<Self> {
        // The lock comes first: a second instance must fail here, having
        // written nothing.
        let lock = LeaderLock::acquire(&store, &config.service_name, Uuid::new_v4())?;

        if store.framework_id()?.is_none() {
            store.set_framework_id(Uuid::new_v4())?;
        }

        let candidate = ConfigRecord::new(config.pod_specs());
        let previous = store.target()?;
        let unchanged = previous.as_ref().is_some_and(|p| p.same_topology(&candidate));

        let target = if unchanged {
            debug!(service = %config.service_name, "topology unchanged; keeping target");
            previous.clone().ok_or(SchedulerError::NotRegistered)?
        } else {
            store.put_config(&candidate)?;
            store.set_target_id(candidate.id)?;
            info!(
                service = %config.service_name,
                target = %candidate.id,
                "new target configuration accepted"
            );
            candidate
        };

        let registry = PodRegistry::load(&config.service_name, target.pods.clone(), &store)?;

        let mut plans: BTreeMap<String, Plan> = BTreeMap::new();
        if unchanged {
            // Pick up persisted plans; the CLI may have mutated them
            // between scheduler runs.
            for name in store.list_plan_names()? {
                if let Some(bytes) = store.get_plan(&name)? {
                    let plan = serde_json::from_slice(&bytes)
                        .map_err(|e| StateError::Deserialize(e.to_string()))?;
                    plans.insert(name, plan);
                }
            }
            plans
                .entry(DEPLOY.to_string())
                .or_insert_with(|| deploy_plan(Some(&target), &target));
        } else {
            plans.insert(DEPLOY.to_string(), deploy_plan(previous.as_ref(), &target));
            if let Some(prev) = &previous {
                match decommission_plan(prev, &target) {
                    Some(plan) => {
                        plans.insert(DECOMMISSION.to_string(), plan);
                    }
                    None => {
                        // A decommission from an older target no longer applies.
                        store.delete_plan(DECOMMISSION)?;
                    }
                }
            }
        }
        plans.entry(RECOVERY.to_string()).or_insert_with(|| {
            let mut failed = registry.tasks_in_state(TaskState::Failed);
            failed.retain(|t| registry.contains_instance(&t.instance));
            recovery_plan(&failed)
        });

        let cache = StateCache::new(store.clone(), config.state_cache_enabled)?;

        let state = Self {
            config,
            store,
            cache,
            registry,
            plans,
            launcher,
            lock: Some(lock),
        };
        state.persist_plans()?;
        Ok(state)
    }

    /// Attach to an already-registered service without taking leadership.
    /// Used by the command surface; mutations are limited to plans.
    pub fn attach(config: ServiceConfig, store: StateStore) -> SchedulerResult<Self> {
        let target = store.target()?.ok_or(SchedulerError::NotRegistered)?;
        let registry = PodRegistry::load(&config.service_name, target.pods.clone(), &store)?;

        let mut plans = BTreeMap::new();
        for name in store.list_plan_names()? {
            if let Some(bytes) = store.get_plan(&name)? {
                let plan = serde_json::from_slice(&bytes)
                    .map_err(|e| StateError::Deserialize(e.to_string()))?;
                plans.insert(name, plan);
            }
        }

        let cache = StateCache::new(store.clone(), config.state_cache_enabled)?;
        Ok(Self {
            config,
            store,
            cache,
            registry,
            plans,
            launcher: Box::new(LocalLauncher),
            lock: None,
        })
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The instance id holding leadership, if this scheduler holds it.
    pub fn leader_id(&self) -> Option<Uuid> {
        self.lock.as_ref().map(LeaderLock::owner)
    }

    // ── Plan execution ─────────────────────────────────────────────

    /// Advance every eligible plan step one stage, performing the task
    /// work attached to each transition. Returns whether anything moved.
    pub fn tick(&mut self) -> SchedulerResult<bool> {
        let before: BTreeMap<String, Status> =
            self.plans.iter().map(|(n, p)| (n.clone(), p.status())).collect();

        let mut plans = std::mem::take(&mut self.plans);
        let mut progress = false;
        let mut outcome = Ok(());
        for name in [DEPLOY, DECOMMISSION, RECOVERY] {
            if let Some(plan) = plans.get_mut(name) {
                match self.tick_plan(plan) {
                    Ok(moved) => progress |= moved,
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
        }
        self.plans = plans;
        outcome?;

        if progress {
            for (name, plan) in &self.plans {
                let was_complete = before.get(name).is_some_and(Status::is_complete);
                if plan.is_complete() && !was_complete {
                    self.cache.put(LAST_COMPLETED_UPDATE_TYPE, name.as_bytes())?;
                    info!(plan = %name, "plan complete");
                }
            }
            let all_complete = self.plans.values().all(Plan::is_complete);
            self.cache
                .put(SUPPRESSED, if all_complete { b"true" } else { b"false" })?;
            self.persist_plans()?;
        }
        Ok(progress)
    }

    /// Tick until no plan makes further progress. An ERROR or WAITING
    /// phase stops silently; the plans report their own status.
    pub fn run_to_completion(&mut self) -> SchedulerResult<()> {
        while self.tick()? {}
        Ok(())
    }

    fn tick_plan(&mut self, plan: &mut Plan) -> SchedulerResult<bool> {
        let mut progress = false;
        for (pi, si) in plan.eligible_steps() {
            let step = &mut plan.phases[pi].steps[si];
            let next = step.advance();
            progress = true;
            match (step.action, next) {
                (StepAction::Kill, Status::Starting) => {
                    match self.kill_instance(&step.instance) {
                        Ok(()) => {}
                        Err(SchedulerError::LaunchFailure { instance, reason }) => {
                            warn!(%instance, %reason, "kill refused");
                            step.fail();
                        }
                        Err(other) => return Err(other),
                    }
                }
                (StepAction::Launch | StepAction::Relaunch, Status::Starting) => {
                    let force = step.action == StepAction::Relaunch;
                    match self.ensure_task(&step.instance, force) {
                        // Already satisfied: nothing to launch, the step
                        // finishes immediately and the task is untouched.
                        Ok(false) => {
                            step.advance();
                            step.advance();
                        }
                        Ok(true) => {}
                        Err(SchedulerError::LaunchFailure { instance, reason }) => {
                            warn!(%instance, %reason, "launch failed");
                            step.fail();
                        }
                        Err(other) => return Err(other),
                    }
                }
                (StepAction::Kill, _) => {}
                (_, Status::InProgress) => {
                    self.set_task_state(&step.instance, TaskState::Starting)?
                }
                (_, Status::Complete) => {
                    self.set_task_state(&step.instance, TaskState::Running)?
                }
                _ => {}
            }
        }
        Ok(progress)
    }

    /// Launch the task backing `instance` unless it is already running
    /// with the target resources. Returns whether a launch was issued;
    /// a skipped launch leaves the task uuid untouched.
    fn ensure_task(&mut self, instance: &str, force: bool) -> SchedulerResult<bool> {
        let (pod, resources) = self.target_spec_for(instance)?;
        if !force
            && let Some(task) = self.registry.task(instance)
            && task.state == TaskState::Running
            && task.resources.matches(&resources)
        {
            return Ok(false);
        }

        let task = TaskRecord::launch(&self.config.service_name, &pod, instance, resources);
        self.launcher.launch(&task).map_err(|e| SchedulerError::LaunchFailure {
            instance: instance.to_string(),
            reason: e.to_string(),
        })?;
        info!(task = %task.id, "task launched");
        self.store.put_task(&task)?;
        self.cache
            .put(&task.status_property_key(), task.state.as_str().as_bytes())?;
        self.registry.insert_task(task);
        Ok(true)
    }

    /// Tear down the task backing `instance`. The task record is removed;
    /// its `:task-status` property is retained as TASK_KILLED.
    fn kill_instance(&mut self, instance: &str) -> SchedulerResult<()> {
        let Some(task) = self.registry.task(instance).cloned() else {
            return Ok(());
        };
        self.launcher.kill(&task).map_err(|e| SchedulerError::LaunchFailure {
            instance: instance.to_string(),
            reason: e.to_string(),
        })?;
        info!(task = %task.id, "task killed");
        self.registry.remove_task(instance);
        self.store.delete_task(instance)?;
        self.cache
            .put(&task.status_property_key(), TaskState::Killed.as_str().as_bytes())?;
        Ok(())
    }

    fn set_task_state(&mut self, instance: &str, state: TaskState) -> SchedulerResult<()> {
        let Some(task) = self.registry.task_mut(instance) else {
            return Ok(());
        };
        task.state = state;
        let task = task.clone();
        self.store.put_task(&task)?;
        self.cache
            .put(&task.status_property_key(), state.as_str().as_bytes())?;
        Ok(())
    }

    fn target_spec_for(&self, instance: &str) -> SchedulerResult<(String, Resources)> {
        if let Some((pod, _)) = split_instance_name(instance)
            && let Some(spec) = self.registry.pods().iter().find(|p| p.name == pod)
        {
            return Ok((spec.name.clone(), spec.resources));
        }
        // Recovery of a task whose pod left the target keeps its old shape.
        if let Some(task) = self.registry.task(instance) {
            return Ok((task.pod.clone(), task.resources));
        }
        Err(SchedulerError::InstanceNotFound(instance.to_string()))
    }

    // ── Plan surface ───────────────────────────────────────────────

    /// Names of all known plans, sorted.
    pub fn plan_names(&self) -> Vec<String> {
        self.plans.keys().cloned().collect()
    }

    pub fn plan(&self, name: &str) -> SchedulerResult<&Plan> {
        self.plans
            .get(name)
            .ok_or_else(|| SchedulerError::PlanNotFound(name.to_string()))
    }

    /// Pause a phase of a plan. Rejected once the plan is complete.
    pub fn interrupt_plan(&mut self, name: &str, phase: &str) -> SchedulerResult<()> {
        self.plan_mut(name)?.interrupt(phase)?;
        self.persist_plan(name)
    }

    /// Resume a paused phase.
    pub fn continue_plan(&mut self, name: &str, phase: &str) -> SchedulerResult<()> {
        self.plan_mut(name)?.proceed(phase)?;
        self.persist_plan(name)
    }

    /// Reset a plan to PENDING regardless of its status.
    pub fn force_restart_plan(&mut self, name: &str) -> SchedulerResult<()> {
        self.plan_mut(name)?.force_restart();
        self.persist_plan(name)
    }

    fn plan_mut(&mut self, name: &str) -> SchedulerResult<&mut Plan> {
        self.plans
            .get_mut(name)
            .ok_or_else(|| SchedulerError::PlanNotFound(name.to_string()))
    }

    fn persist_plan(&self, name: &str) -> SchedulerResult<()> {
        let plan = self.plan(name)?;
        let bytes = serde_json::to_vec(plan).map_err(|e| StateError::Serialize(e.to_string()))?;
        self.store.put_plan(name, &bytes)?;
        Ok(())
    }

    fn persist_plans(&self) -> SchedulerResult<()> {
        for name in self.plans.keys() {
            self.persist_plan(name)?;
        }
        Ok(())
    }

    // ── Task status updates ────────────────────────────────────────

    /// Apply a task status update from the runtime. A TASK_FAILED report
    /// rebuilds the recovery plan from the current set of failed tasks.
    pub fn handle_task_status(&mut self, instance: &str, state: TaskState) -> SchedulerResult<()> {
        if self.registry.task(instance).is_none() {
            return Err(SchedulerError::InstanceNotFound(instance.to_string()));
        }
        self.set_task_state(instance, state)?;

        if state == TaskState::Failed {
            let mut failed = self.registry.tasks_in_state(TaskState::Failed);
            failed.retain(|t| self.registry.contains_instance(&t.instance));
            info!(count = failed.len(), "rebuilding recovery plan");
            self.plans.insert(RECOVERY.to_string(), recovery_plan(&failed));
            self.persist_plan(RECOVERY)?;
        }
        Ok(())
    }

    // ── Query surface ──────────────────────────────────────────────

    /// All pod instance names in the target topology.
    pub fn instance_names(&self) -> Vec<String> {
        self.registry.instance_names()
    }

    pub fn service_status(&self) -> ServiceStatusView {
        self.registry.service_status()
    }

    pub fn instance_status(&self, instance: &str) -> SchedulerResult<InstanceStatusView> {
        self.registry.instance_status(instance)
    }

    pub fn instance_info(&self, instance: &str) -> SchedulerResult<Vec<TaskInfoView>> {
        self.registry.instance_info(instance)
    }

    /// All property keys, sorted, served through the cache.
    pub fn properties(&self) -> SchedulerResult<Vec<String>> {
        Ok(self.cache.keys()?)
    }

    pub fn property(&self, key: &str) -> SchedulerResult<Vec<u8>> {
        self.cache
            .get(key)?
            .ok_or_else(|| SchedulerError::PropertyNotFound(key.to_string()))
    }

    /// Force a cache reload. Deterministically rejected when caching is
    /// disabled; the scheduler carries on either way.
    pub fn refresh_cache(&self) -> SchedulerResult<()> {
        self.cache.refresh().map_err(|e| match e {
            StateError::Conflict(msg) => SchedulerError::Conflict(msg),
            other => SchedulerError::State(other),
        })
    }

    pub fn framework_id(&self) -> SchedulerResult<Uuid> {
        self.store.framework_id()?.ok_or(SchedulerError::NotRegistered)
    }

    pub fn config_ids(&self) -> SchedulerResult<Vec<Uuid>> {
        Ok(self.store.list_config_ids()?)
    }

    pub fn config_version(&self, id: Uuid) -> SchedulerResult<ConfigRecord> {
        self.store
            .get_config(id)?
            .ok_or(SchedulerError::ConfigNotFound(id))
    }

    pub fn target(&self) -> SchedulerResult<ConfigRecord> {
        self.store.target()?.ok_or(SchedulerError::NotRegistered)
    }

    pub fn target_id(&self) -> SchedulerResult<Uuid> {
        self.store.target_id()?.ok_or(SchedulerError::NotRegistered)
    }
}
