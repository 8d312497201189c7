//! Scheduler error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use stevedore_plan::PlanError;
use stevedore_state::StateError;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The service has no persisted target configuration yet.
    #[error("service is not registered")]
    NotRegistered,

    #[error("pod instance not found: {0}")]
    InstanceNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("configuration version not found: {0}")]
    ConfigNotFound(Uuid),

    #[error("property not found: {0}")]
    PropertyNotFound(String),

    /// Deterministic, non-fatal rejection of an operation that cannot
    /// apply in the current mode (e.g. refreshing a disabled cache).
    #[error("failed: 409 Conflict ({0})")]
    Conflict(String),

    /// The runtime refused to launch a task. Recorded as an ERROR step;
    /// recovery is manual via plan force-restart.
    #[error("failed to launch {instance}: {reason}")]
    LaunchFailure { instance: String, reason: String },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    State(#[from] StateError),
}
