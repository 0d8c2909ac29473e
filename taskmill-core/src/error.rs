//! The scheduler's public error taxonomy.
//!
//! No task failure ever escapes the worker loop — every task outcome is
//! recorded on its snapshot and read back via [`crate::Scheduler::get`]
//! or [`crate::Scheduler::status`]. These variants only cover
//! programmer errors against the supervisor API itself: an unknown
//! task id, a duplicate id, or submitting after shutdown.

use taskmill_shared::ids::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} already exists")]
    AlreadyExists(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("scheduler is shutting down and cannot accept new work")]
    ShuttingDown,

    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),
}

impl From<crate::registry::RegistryError> for SchedulerError {
    fn from(err: crate::registry::RegistryError) -> Self {
        match err {
            crate::registry::RegistryError::AlreadyExists(id) => SchedulerError::AlreadyExists(id),
            crate::registry::RegistryError::NotFound(id) => SchedulerError::NotFound(id),
        }
    }
}
