//! stevedore-scheduler — scheduler state and plan execution.
//!
//! Ties the other crates together: registration acquires the leadership
//! lock, reconciles the declared pod topology against the persisted
//! target, generates deployment plans, and executes them against a task
//! launcher. The query surface backs the CLI.
//!
//! # Components
//!
//! - **`registry`** — live pod topology, task records, status/info views
//! - **`launcher`** — the seam to the task runtime
//! - **`scheduler`** — registration, tick loop, plan and query surface
//! - **`error`** — the scheduler error taxonomy

pub mod error;
pub mod launcher;
pub mod registry;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use launcher::{LaunchError, LocalLauncher, TaskLauncher};
pub use registry::{
    InstanceStatusView, PodRegistry, PodStatusView, ServiceStatusView, TaskInfoView,
    TaskStatusView,
};
pub use scheduler::{LAST_COMPLETED_UPDATE_TYPE, SUPPRESSED, SchedulerState};
