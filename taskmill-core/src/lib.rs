//! # Taskmill Core
//!
//! A concurrent task scheduler: submit units of work tagged with a
//! priority and an optional dependency set, run them across a
//! configurable pool of workers, track their lifecycle, cancel them
//! before they run, enforce per-task timeouts, and keep the pool
//! healthy by restarting dead workers and scaling on demand.
//!
//! ## Modules
//!
//! - `task`: the task descriptor, lifecycle state machine, work-unit type
//! - `registry`: the shared task registry (the single source of truth)
//! - `queue`: the priority-ordered ready queue
//! - `dispatch`: submission, the dependency-release sweep, failure propagation
//! - `worker`: the per-slot worker loop
//! - `timeout`: forcible timeout enforcement
//! - `scheduler`: the supervisor facade — the type most callers want
//! - `error`: the public error taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use taskmill_core::{Scheduler, SubmitOptions};
//! use taskmill_shared::config::SchedulerConfig;
//!
//! # async fn example() {
//! let scheduler = Scheduler::new(SchedulerConfig::default()).await;
//! let id = scheduler
//!     .submit(|| async { Ok::<_, String>(5 + 3) }, SubmitOptions::default())
//!     .unwrap();
//!
//! scheduler.wait_completion(std::time::Duration::from_millis(50)).await;
//! let snapshot = scheduler.get(id).unwrap();
//! assert_eq!(snapshot.result, Some(serde_json::json!(8)));
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod task;
pub mod timeout;
pub mod worker;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, StatusReport, WorkerCounts};
pub use task::{SubmitOptions, TaskFn, TaskFuture, TaskOutput, TaskSnapshot, TaskStatus};
pub use taskmill_shared::ids::TaskId;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_version_is_set() {
        assert!(!env!("CARGO_PKG_VERSION").is_empty());
    }
}
