//! The shared task registry: the single source of truth for task
//! lifecycle state, serialized under one lock rather than sharded, so
//! every transition is atomic with respect to every other.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;
use taskmill_shared::ids::TaskId;
use thiserror::Error;

use crate::task::{SubmitOptions, TaskOutput, TaskSnapshot, TaskStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task {0} already exists")]
    AlreadyExists(TaskId),
    #[error("task {0} not found")]
    NotFound(TaskId),
}

struct Inner {
    tasks: HashMap<TaskId, TaskSnapshot>,
    completed: HashSet<TaskId>,
    cancelled: HashSet<TaskId>,
    queued: HashSet<TaskId>,
}

/// Process-wide map from task id to task, plus the auxiliary
/// completed/cancelled/queued sets that make the invariants in the
/// scheduler's data model hold.
///
/// Guarded by a single `std::sync::Mutex`: every operation here is a
/// synchronous map mutation with no I/O and no `.await` held across the
/// lock, so a plain blocking mutex is both correct and cheaper than an
/// async one — exactly the "plain in-memory registry protected by a
/// single lock" the design notes recommend over a process-shared proxy
/// map.
pub struct TaskRegistry {
    inner: Mutex<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                completed: HashSet::new(),
                cancelled: HashSet::new(),
                queued: HashSet::new(),
            }),
        }
    }

    /// Inserts a newly-submitted task as PENDING.
    pub fn insert(&self, id: TaskId, options: &SubmitOptions) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tasks.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }
        inner.tasks.insert(id, TaskSnapshot::new(id, options, Utc::now()));
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Result<TaskSnapshot, RegistryError> {
        let inner = self.inner.lock().unwrap();
        inner.tasks.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }

    /// Idempotent: a second call for the same id is a no-op, which is
    /// what keeps invariant Q1 (a task enters the ready queue at most
    /// once) safe under the sweep's re-entrancy.
    pub fn mark_queued(&self, id: TaskId) {
        let mut inner = self.inner.lock().unwrap();
        inner.queued.insert(id);
    }

    pub fn mark_running(&self, id: TaskId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let task = inner.tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&self, id: TaskId, result: TaskOutput) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let task = inner.tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.ended_at = Some(Utc::now());
        inner.completed.insert(id);
        Ok(())
    }

    pub fn mark_failed(&self, id: TaskId, err: impl Into<String>) -> Result<(), RegistryError> {
        self.mark_terminal_with_error(id, TaskStatus::Failed, err.into())
    }

    pub fn mark_timeout(&self, id: TaskId, err: impl Into<String>) -> Result<(), RegistryError> {
        self.mark_terminal_with_error(id, TaskStatus::Timeout, err.into())
    }

    /// Marks a PENDING task CANCELLED because a dependency of it ended
    /// in a non-COMPLETED terminal state. Distinguished from
    /// `try_cancel` (an external, user-initiated cancel) only by the
    /// error text recorded, so callers can tell the two apart.
    pub fn mark_dependency_failed(&self, id: TaskId, failed_dep: TaskId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let task = inner.tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if task.status != TaskStatus::Pending {
            return Ok(());
        }
        task.status = TaskStatus::Cancelled;
        task.error = Some(format!("dependency {failed_dep} did not complete"));
        task.ended_at = Some(Utc::now());
        inner.cancelled.insert(id);
        Ok(())
    }

    fn mark_terminal_with_error(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: String,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let task = inner.tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        task.status = status;
        task.error = Some(error);
        task.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Succeeds only if the task is currently PENDING; atomic with
    /// respect to the dispatch path so a worker can never observe a
    /// task transitioning to RUNNING after a successful cancel.
    pub fn try_cancel(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Cancelled;
                task.ended_at = Some(Utc::now());
                inner.cancelled.insert(id);
                true
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self, id: TaskId) -> bool {
        self.inner.lock().unwrap().cancelled.contains(&id)
    }

    pub fn dependencies_satisfied(&self, dependencies: &[TaskId]) -> bool {
        let inner = self.inner.lock().unwrap();
        dependencies.iter().all(|dep| inner.completed.contains(dep))
    }

    /// Ids of every task that is PENDING and has not yet been pushed to
    /// the ready queue — the candidate set the dependency-release sweep
    /// and the failure-propagation pass both walk.
    pub fn pending_unqueued_ids(&self) -> Vec<TaskId> {
        let inner = self.inner.lock().unwrap();
        inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && !inner.queued.contains(&t.id))
            .map(|t| t.id)
            .collect()
    }

    /// Ids of every PENDING task whose dependency set includes `dep`,
    /// used by dependency-failure propagation.
    pub fn pending_dependents_of(&self, dep: TaskId) -> Vec<TaskId> {
        let inner = self.inner.lock().unwrap();
        inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.dependencies.contains(&dep))
            .map(|t| t.id)
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let inner = self.inner.lock().unwrap();
        let mut counts = StatusCounts::default();
        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
                TaskStatus::Timeout => counts.timeout += 1,
            }
        }
        counts
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub timeout: usize,
}
