//! The task descriptor, its lifecycle state machine, and the work-unit
//! abstraction workers execute.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskmill_shared::ids::TaskId;

/// Smaller values run first; default is 5.
pub type Priority = i32;

/// The JSON-serialized return value of a task body.
pub type TaskOutput = serde_json::Value;

/// The boxed future a work unit resolves to.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<TaskOutput, String>> + Send>>;

/// A work unit: a callable already bound to its arguments, producing a
/// future when invoked. Submitting `move || async move { ... }` is the
/// idiomatic way to capture "function plus frozen args" in a
/// thread-based scheduler — no serialization boundary to cross.
pub type TaskFn = Box<dyn FnOnce() -> TaskFuture + Send>;

/// Wraps an `async` closure into a [`TaskFn`], serializing its output to
/// [`TaskOutput`] and its error to a string.
pub fn boxed_task<F, Fut, T, E>(func: F) -> TaskFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize,
    E: std::fmt::Display,
{
    Box::new(move || {
        Box::pin(async move {
            match func().await {
                Ok(value) => serde_json::to_value(value)
                    .map_err(|e| format!("failed to serialize task result: {e}")),
                Err(e) => Err(e.to_string()),
            }
        })
    })
}

/// Lifecycle state of a task.
///
/// Terminal states are [`Completed`](TaskStatus::Completed),
/// [`Failed`](TaskStatus::Failed), [`Cancelled`](TaskStatus::Cancelled),
/// and [`Timeout`](TaskStatus::Timeout); no task transitions out of a
/// terminal state (invariant I7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
        )
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(&self, next: &TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Pending, Cancelled) => true,
            (Running, Completed) => true,
            (Running, Failed) => true,
            (Running, Timeout) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Timeout => "TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// Options accepted by [`crate::Scheduler::submit`], mirroring the
/// `priority`/`deps`/`timeout` keyword arguments of the original
/// interface.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub priority: Priority,
    pub dependencies: Vec<TaskId>,
    pub timeout: Option<Duration>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            priority: 5,
            dependencies: Vec::new(),
            timeout: None,
        }
    }
}

/// A point-in-time, cloneable view of a task's lifecycle fields — what
/// the registry hands back from `get()` and `status()`. The work unit
/// itself never appears here: once a [`TaskFn`] is consumed by a
/// worker it cannot be observed again, only its outcome can.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub priority: Priority,
    pub dependencies: Vec<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    pub(crate) fn new(id: TaskId, options: &SubmitOptions, now: DateTime<Utc>) -> Self {
        Self {
            id,
            priority: options.priority,
            dependencies: options.dependencies.clone(),
            timeout: options.timeout,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }
}
