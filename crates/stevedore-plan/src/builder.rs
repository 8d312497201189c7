//! Plan generation from configuration diffs.
//!
//! The deploy plan covers launches and relaunches toward a new target
//! config; the decommission plan tears down removed instances, highest
//! index first; the recovery plan relaunches tasks the runtime reported
//! as failed.

use stevedore_core::types::{instance_name, task_name};
use stevedore_state::{ConfigRecord, TaskRecord};

use crate::plan::{Phase, Plan, Step, StepAction};

/// Plan name for deployments and configuration updates.
pub const DEPLOY: &str = "deploy";
/// Plan name for scale-down teardown.
pub const DECOMMISSION: &str = "decommission";
/// Plan name for failed-task relaunches.
pub const RECOVERY: &str = "recovery";

/// Build the deploy plan for a target configuration.
///
/// One phase per pod type, in declaration order; one step per instance.
/// Instances already satisfied by `old` (same resources) get
/// pre-completed steps, so their tasks are provably untouched. Resource
/// changes become relaunch steps; new instances become launch steps.
pub fn deploy_plan(old: Option<&ConfigRecord>, new: &ConfigRecord) -> Plan {
    let mut phases = Vec::with_capacity(new.pods.len());
    for pod in &new.pods {
        let old_pod = old.and_then(|o| o.pod(&pod.name));
        let mut steps = Vec::with_capacity(pod.count as usize);
        for index in 0..pod.count {
            let instance = instance_name(&pod.name, index);
            let name = task_name(&instance);
            let step = match old_pod {
                Some(prev) if index < prev.count => {
                    if prev.resources.matches(&pod.resources) {
                        Step::completed(&name, &instance, StepAction::Launch)
                    } else {
                        Step::new(&name, &instance, StepAction::Relaunch)
                    }
                }
                _ => Step::new(&name, &instance, StepAction::Launch),
            };
            steps.push(step);
        }
        phases.push(Phase::new(&pod.name, steps));
    }
    Plan::new(DEPLOY, phases)
}

/// Build the decommission plan for a scale-down, if any instances are
/// being removed. Steps kill the highest-indexed instances first;
/// survivors keep their identity.
pub fn decommission_plan(old: &ConfigRecord, new: &ConfigRecord) -> Option<Plan> {
    let mut phases = Vec::new();
    for pod in &old.pods {
        let new_count = new.pod(&pod.name).map_or(0, |p| p.count);
        if new_count >= pod.count {
            continue;
        }
        let steps: Vec<Step> = (new_count..pod.count)
            .rev()
            .map(|index| {
                let instance = instance_name(&pod.name, index);
                Step::new(&task_name(&instance), &instance, StepAction::Kill)
            })
            .collect();
        phases.push(Phase::new(&pod.name, steps));
    }
    if phases.is_empty() { None } else { Some(Plan::new(DECOMMISSION, phases)) }
}

/// Build the recovery plan for tasks reported failed by the runtime.
/// Empty input yields an (immediately complete) empty plan.
pub fn recovery_plan(failed: &[TaskRecord]) -> Plan {
    let mut phases: Vec<Phase> = Vec::new();
    for task in failed {
        let step = Step::new(&task.name, &task.instance, StepAction::Relaunch);
        match phases.iter_mut().find(|p| p.name == task.pod) {
            Some(phase) => phase.steps.push(step),
            None => phases.push(Phase::new(&task.pod, vec![step])),
        }
    }
    Plan::new(RECOVERY, phases)
}
