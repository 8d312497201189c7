//! Plan element status and the bottom-up rollup rule.

use serde::{Deserialize, Serialize};

/// Status of a plan, phase, or step.
///
/// Steps move monotonically along PENDING → PREPARED → STARTING →
/// IN_PROGRESS → COMPLETE. WAITING is an operator-induced pause, only
/// ever derived for phases/plans from an interrupt. ERROR is sticky
/// until a force-restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Prepared,
    Starting,
    InProgress,
    Waiting,
    Complete,
    Error,
}

impl Status {
    pub fn is_complete(&self) -> bool {
        *self == Status::Complete
    }

    /// Derive a parent status from its children, strictly bottom-up:
    /// a parent is COMPLETE iff every child is COMPLETE, ERROR if any
    /// child is ERROR, WAITING if any child is paused, PENDING only
    /// when nothing has started.
    pub fn roll_up<I: IntoIterator<Item = Status>>(children: I) -> Status {
        let mut any = false;
        let mut all_complete = true;
        let mut all_pending = true;
        let mut waiting = false;
        for child in children {
            any = true;
            match child {
                Status::Error => return Status::Error,
                Status::Waiting => waiting = true,
                Status::Complete => all_pending = false,
                Status::Pending => all_complete = false,
                _ => {
                    all_complete = false;
                    all_pending = false;
                }
            }
            if child != Status::Complete {
                all_complete = false;
            }
        }
        if !any || all_complete {
            return Status::Complete;
        }
        if waiting {
            return Status::Waiting;
        }
        if all_pending {
            return Status::Pending;
        }
        Status::InProgress
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Pending => "PENDING",
            Status::Prepared => "PREPARED",
            Status::Starting => "STARTING",
            Status::InProgress => "IN_PROGRESS",
            Status::Waiting => "WAITING",
            Status::Complete => "COMPLETE",
            Status::Error => "ERROR",
        };
        f.write_str(name)
    }
}
