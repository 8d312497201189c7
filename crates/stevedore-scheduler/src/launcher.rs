//! TaskLauncher — the seam between plan execution and the task runtime.
//!
//! The scheduler decides what to launch and kill; the launcher carries
//! the request to whatever actually runs tasks. The default launcher
//! models a cooperative runtime that accepts every request, which is
//! what plan execution needs in order to drive steps to COMPLETE.

use thiserror::Error;
use tracing::debug;

use stevedore_state::TaskRecord;

/// The runtime refused a launch or kill request.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LaunchError(pub String);

/// Carries launch and kill requests to the task runtime.
pub trait TaskLauncher {
    fn launch(&self, task: &TaskRecord) -> Result<(), LaunchError>;

    fn kill(&self, task: &TaskRecord) -> Result<(), LaunchError>;
}

/// Launcher for a runtime that accepts every request.
pub struct LocalLauncher;

impl TaskLauncher for LocalLauncher {
    fn launch(&self, task: &TaskRecord) -> Result<(), LaunchError> {
        debug!(task = %task.id, "launch accepted");
        Ok(())
    }

    fn kill(&self, task: &TaskRecord) -> Result<(), LaunchError> {
        debug!(task = %task.id, "kill accepted");
        Ok(())
    }
}
