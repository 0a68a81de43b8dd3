//! Domain errors
//!
//! Every variant is a precondition rejection of one call. Nothing here is
//! transient; the caller must change the request rather than retry it.

use thiserror::Error;

use crate::role::{Privilege, Role};
use crate::task::TaskId;

/// What a caller needed in order to be allowed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Assigned to the role, or operational privilege
    Role(Role),
    /// A privilege tier
    Privilege(Privilege),
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "role {} or operational privilege", role),
            Requirement::Privilege(privilege) => write!(f, "{} privilege", privilege),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnaroundError {
    #[error("Invalid task id {task_id}: must be below {}", crate::task::TASK_COUNT)]
    InvalidTask { task_id: TaskId },

    #[error("Identity {identity} is not authorized: requires {required}")]
    Unauthorized {
        identity: String,
        required: Requirement,
    },

    #[error("Task {task_id} is already completed")]
    AlreadyCompleted { task_id: TaskId },

    #[error("Turnaround is already certified")]
    AlreadyCertified,

    #[error("Task {task_id} is not completed")]
    NotCompleted { task_id: TaskId },

    #[error("Task {task_id} was not completed late")]
    NotLate { task_id: TaskId },

    #[error("Mandatory tasks incomplete: {outstanding:?}")]
    MandatoryTaskIncomplete { outstanding: Vec<TaskId> },

    #[error("Invalid schedule: arrival {scheduled_arrival} must precede departure {scheduled_departure}")]
    InvalidSchedule {
        scheduled_arrival: u64,
        scheduled_departure: u64,
    },

    #[error("Justification for task {task_id} is empty")]
    EmptyJustification { task_id: TaskId },

    #[error("Task {task_id} is already justified")]
    AlreadyJustified { task_id: TaskId },

    #[error("Turnaround is not certified")]
    NotCertified,

    #[error("Badge already issued for role {role}")]
    BadgeAlreadyIssued { role: Role },

    #[error("Invalid certification hash: {0}")]
    InvalidHash(String),

    #[error("Replay diverged: {0}")]
    ReplayDivergence(String),
}

pub type Result<T> = std::result::Result<T, TurnaroundError>;
