//! Plan/Phase/Step — the deployment state machine.
//!
//! Steps carry the primary state and advance one stage at a time along
//! the monotonic forward path. Phases execute serially: only the first
//! non-complete phase has eligible steps, and an interrupted phase
//! blocks everything behind it. Phase and plan statuses are derived by
//! [`Status::roll_up`]; nothing is ever marked complete top-down.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::status::Status;

/// Errors raised by plan operations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Interrupting a plan that has already run to completion; there is
    /// nothing left to halt.
    #[error("invalid transition: plan {plan} is {status}")]
    InvalidTransition { plan: String, status: Status },

    #[error("phase not found: {phase} in plan {plan}")]
    PhaseNotFound { plan: String, phase: String },
}

/// What executing a step means for the backing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Ensure the instance is running with the target resources; launch
    /// only if it is not already satisfied (keeps the task uuid stable).
    Launch,
    /// Unconditionally replace the task, minting a new uuid.
    Relaunch,
    /// Tear the task down (decommission). Its properties are retained.
    Kill,
}

/// A single unit of deployment work against one pod instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Step name, e.g. `world-1-server`.
    pub name: String,
    /// The pod instance this step operates on, e.g. `world-1`.
    pub instance: String,
    pub action: StepAction,
    pub status: Status,
}

impl Step {
    pub fn new(name: &str, instance: &str, action: StepAction) -> Self {
        Self {
            name: name.to_string(),
            instance: instance.to_string(),
            action,
            status: Status::Pending,
        }
    }

    /// A step created in the COMPLETE state (no work required).
    pub fn completed(name: &str, instance: &str, action: StepAction) -> Self {
        Self { status: Status::Complete, ..Self::new(name, instance, action) }
    }

    /// Advance one stage along the monotonic forward path. Returns the
    /// new status. COMPLETE and ERROR are fixed points.
    pub fn advance(&mut self) -> Status {
        self.status = match self.status {
            Status::Pending => Status::Prepared,
            Status::Prepared => Status::Starting,
            Status::Starting => Status::InProgress,
            Status::InProgress => Status::Complete,
            terminal => terminal,
        };
        debug!(step = %self.name, status = %self.status, "step advanced");
        self.status
    }

    /// Record an unrecoverable launch failure. ERROR is sticky until the
    /// owning plan is force-restarted.
    pub fn fail(&mut self) {
        self.status = Status::Error;
    }

    /// Reset to the initial state (force-restart).
    pub fn reset(&mut self) {
        self.status = Status::Pending;
    }
}

/// An ordered group of steps, usually one per pod type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub name: String,
    pub steps: Vec<Step>,
    /// Operator-induced pause flag; surfaces as WAITING while work remains.
    interrupted: bool,
}

impl Phase {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self { name: name.to_string(), steps, interrupted: false }
    }

    /// Derived status. An interrupted phase reports WAITING while any
    /// step is unfinished; already-COMPLETE steps are never reverted.
    pub fn status(&self) -> Status {
        let rolled = Status::roll_up(self.steps.iter().map(|s| s.status));
        if self.interrupted && !rolled.is_complete() && rolled != Status::Error {
            return Status::Waiting;
        }
        rolled
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    fn interrupt(&mut self) {
        self.interrupted = true;
    }

    fn proceed(&mut self) {
        self.interrupted = false;
    }
}

/// A named deployment plan: an ordered sequence of phases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub name: String,
    pub phases: Vec<Phase>,
}

impl Plan {
    pub fn new(name: &str, phases: Vec<Phase>) -> Self {
        Self { name: name.to_string(), phases }
    }

    /// Derived status, rolled up from the phases.
    pub fn status(&self) -> Status {
        Status::roll_up(self.phases.iter().map(|p| p.status()))
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_complete()
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Pause the named phase. Valid only while the plan has work left;
    /// a COMPLETE plan has nothing to interrupt.
    pub fn interrupt(&mut self, phase: &str) -> Result<(), PlanError> {
        let status = self.status();
        if status.is_complete() {
            return Err(PlanError::InvalidTransition { plan: self.name.clone(), status });
        }
        let plan_name = self.name.clone();
        let phase = self.phase_mut(phase)?;
        phase.interrupt();
        info!(plan = %plan_name, phase = %phase.name, "phase interrupted");
        Ok(())
    }

    /// Resume the named phase, reversing a WAITING pause.
    pub fn proceed(&mut self, phase: &str) -> Result<(), PlanError> {
        let plan_name = self.name.clone();
        let phase = self.phase_mut(phase)?;
        phase.proceed();
        info!(plan = %plan_name, phase = %phase.name, "phase resumed");
        Ok(())
    }

    /// Reset the plan and everything under it to the initial state,
    /// regardless of current status. Used to escape ERROR or to
    /// deliberately re-trigger execution.
    pub fn force_restart(&mut self) {
        for phase in &mut self.phases {
            phase.proceed();
            for step in &mut phase.steps {
                step.reset();
            }
        }
        info!(plan = %self.name, "plan force-restarted");
    }

    /// Locations of steps eligible to advance right now, as
    /// (phase index, step index) pairs.
    ///
    /// Phases execute serially: only the first phase with unfinished
    /// work is considered, and if that phase is interrupted (or poisoned
    /// by an ERROR step) nothing is eligible.
    pub fn eligible_steps(&self) -> Vec<(usize, usize)> {
        for (pi, phase) in self.phases.iter().enumerate() {
            let status = phase.status();
            if status.is_complete() {
                continue;
            }
            if status == Status::Waiting || status == Status::Error {
                return Vec::new();
            }
            return phase
                .steps
                .iter()
                .enumerate()
                .filter(|(_, s)| !matches!(s.status, Status::Complete | Status::Error))
                .map(|(si, _)| (pi, si))
                .collect();
        }
        Vec::new()
    }

    fn phase_mut(&mut self, name: &str) -> Result<&mut Phase, PlanError> {
        let plan = self.name.clone();
        self.phases
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PlanError::PhaseNotFound { plan, phase: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_phase_plan() -> Plan {
        Plan::new(
            "deploy",
            vec![
                Phase::new("hello", vec![Step::new("hello-0-server", "hello-0", StepAction::Launch)]),
                Phase::new(
                    "world",
                    vec![
                        Step::new("world-0-server", "world-0", StepAction::Launch),
                        Step::new("world-1-server", "world-1", StepAction::Launch),
                    ],
                ),
            ],
        )
    }

    fn complete_plan(plan: &mut Plan) {
        while !plan.is_complete() {
            let eligible = plan.eligible_steps();
            assert!(!eligible.is_empty(), "plan stuck before completion");
            for (pi, si) in eligible {
                plan.phases[pi].steps[si].advance();
            }
        }
    }

    #[test]
    fn step_happy_path_is_monotonic() {
        let mut step = Step::new("hello-0-server", "hello-0", StepAction::Launch);
        let expected = [
            Status::Prepared,
            Status::Starting,
            Status::InProgress,
            Status::Complete,
            Status::Complete, // fixed point
        ];
        for want in expected {
            assert_eq!(step.advance(), want);
        }
    }

    #[test]
    fn error_is_sticky_until_reset() {
        let mut step = Step::new("s", "i", StepAction::Launch);
        step.fail();
        assert_eq!(step.advance(), Status::Error);
        step.reset();
        assert_eq!(step.status, Status::Pending);
    }

    #[test]
    fn completion_propagates_bottom_up() {
        let mut plan = two_phase_plan();
        assert_eq!(plan.status(), Status::Pending);

        complete_plan(&mut plan);
        assert!(plan.phases.iter().all(|p| p.status().is_complete()));
        assert_eq!(plan.status(), Status::Complete);
    }

    #[test]
    fn phase_incomplete_while_any_step_unfinished() {
        let mut plan = two_phase_plan();
        // Complete the hello phase, then one of the two world steps.
        complete_step(&mut plan, 0, 0);
        complete_step(&mut plan, 1, 0);

        assert!(plan.phases[0].status().is_complete());
        assert_eq!(plan.phases[1].status(), Status::InProgress);
        assert_eq!(plan.status(), Status::InProgress);
    }

    fn complete_step(plan: &mut Plan, pi: usize, si: usize) {
        while plan.phases[pi].steps[si].status != Status::Complete {
            plan.phases[pi].steps[si].advance();
        }
    }

    #[test]
    fn phases_execute_serially() {
        let plan = two_phase_plan();
        // Only the first phase's step is eligible at the start.
        assert_eq!(plan.eligible_steps(), vec![(0, 0)]);
    }

    #[test]
    fn interrupt_pauses_without_reverting() {
        let mut plan = two_phase_plan();
        complete_step(&mut plan, 0, 0);
        complete_step(&mut plan, 1, 0);

        plan.interrupt("world").unwrap();
        assert_eq!(plan.phases[1].status(), Status::Waiting);
        assert_eq!(plan.status(), Status::Waiting);
        // The completed step is untouched.
        assert_eq!(plan.phases[1].steps[0].status, Status::Complete);
        // Nothing is eligible while waiting.
        assert!(plan.eligible_steps().is_empty());

        plan.proceed("world").unwrap();
        assert_eq!(plan.status(), Status::InProgress);
        assert_eq!(plan.eligible_steps(), vec![(1, 1)]);
    }

    #[test]
    fn interrupt_complete_plan_is_invalid() {
        let mut plan = two_phase_plan();
        complete_plan(&mut plan);

        let err = plan.interrupt("world").unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition { .. }));
        // No state change.
        assert!(plan.is_complete());
    }

    #[test]
    fn interrupt_unknown_phase() {
        let mut plan = two_phase_plan();
        let err = plan.interrupt("nope").unwrap_err();
        assert!(matches!(err, PlanError::PhaseNotFound { .. }));
    }

    #[test]
    fn force_restart_resets_everything() {
        let mut plan = two_phase_plan();
        complete_plan(&mut plan);
        plan.phases[1].steps[1].fail();
        assert_eq!(plan.status(), Status::Error);

        plan.force_restart();
        assert_eq!(plan.status(), Status::Pending);
        assert!(plan.phases.iter().all(|p| !p.is_interrupted()));
        assert!(
            plan.phases
                .iter()
                .flat_map(|p| &p.steps)
                .all(|s| s.status == Status::Pending)
        );
    }

    #[test]
    fn error_step_blocks_phase_and_plan() {
        let mut plan = two_phase_plan();
        complete_step(&mut plan, 0, 0);
        plan.phases[1].steps[0].fail();

        assert_eq!(plan.phases[1].status(), Status::Error);
        assert_eq!(plan.status(), Status::Error);
        assert!(plan.eligible_steps().is_empty());
    }

    #[test]
    fn empty_plan_is_complete() {
        let plan = Plan::new("recovery", vec![]);
        assert!(plan.is_complete());
    }

    #[test]
    fn precompleted_steps_need_no_work() {
        let plan = Plan::new(
            "deploy",
            vec![Phase::new(
                "hello",
                vec![Step::completed("hello-0-server", "hello-0", StepAction::Launch)],
            )],
        );
        assert!(plan.is_complete());
        assert!(plan.eligible_steps().is_empty());
    }

    #[test]
    fn serde_round_trip_keeps_interrupt_flag() {
        let mut plan = two_phase_plan();
        plan.interrupt("hello").unwrap();

        let json = serde_json::to_vec(&plan).unwrap();
        let back: Plan = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, plan);
        assert_eq!(back.status(), Status::Waiting);
    }
}
