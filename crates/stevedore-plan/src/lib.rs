//! stevedore-plan — the deployment plan engine.
//!
//! A plan is a three-level state machine (plan ⊇ phase ⊇ step) generated
//! by diffing the declared pod topology against the persisted target
//! configuration. Steps carry the primary state; phase and plan statuses
//! are derived strictly bottom-up.
//!
//! # Components
//!
//! - **`status`** — the shared seven-value status and its rollup rule
//! - **`plan`** — `Plan`/`Phase`/`Step`, transitions, interrupt/continue/force-restart
//! - **`builder`** — deploy, decommission, and recovery plan generation

pub mod builder;
pub mod plan;
pub mod status;

pub use builder::{DECOMMISSION, DEPLOY, RECOVERY, decommission_plan, deploy_plan, recovery_plan};
pub use plan::{Phase, Plan, PlanError, Step, StepAction};
pub use status::Status;
