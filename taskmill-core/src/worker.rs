//! The per-slot worker loop: pull a ready task, guard against a cancel
//! that raced ahead of dispatch, run it under the timeout enforcer,
//! record the outcome, and trigger the appropriate sweep.

use std::sync::Arc;
use std::time::Duration;

use taskmill_shared::ids::TaskId;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::SchedulerCore;
use crate::timeout::{run_with_timeout, Outcome};

/// Runs one worker slot's loop until `shutdown` is signalled.
///
/// `current_task` lets the supervisor attribute an orphaned RUNNING
/// task to this slot if the slot is torn down (by forced scale-down or
/// by the loop panicking) while a task is in flight.
pub async fn run(
    index: usize,
    core: Arc<SchedulerCore>,
    shutdown: CancellationToken,
    pop_timeout: Duration,
    current_task: Arc<AsyncMutex<Option<TaskId>>>,
) {
    info!(worker = index, "worker started");
    loop {
        let queued = match core.queue.pop(pop_timeout).await {
            Some(queued) => queued,
            None => {
                if shutdown.is_cancelled() {
                    break;
                }
                continue;
            }
        };

        if core.registry.is_cancelled(queued.id) {
            debug!(worker = index, task_id = %queued.id, "discarding task cancelled before dispatch");
            continue;
        }

        if core.registry.mark_running(queued.id).is_err() {
            warn!(worker = index, task_id = %queued.id, "task vanished from registry before dispatch");
            continue;
        }
        *current_task.lock().await = Some(queued.id);

        let snapshot = core.registry.get(queued.id).expect("just marked running");
        let future = (queued.func)();
        let outcome = run_with_timeout(snapshot.timeout, future).await;

        match outcome {
            Outcome::Completed(value) => {
                let _ = core.registry.mark_completed(queued.id, value);
                info!(worker = index, task_id = %queued.id, "task completed");
                core.release_ready();
            }
            Outcome::Failed(err) => {
                let _ = core.registry.mark_failed(queued.id, err);
                info!(worker = index, task_id = %queued.id, "task failed");
                core.propagate_dependency_failure(queued.id);
            }
            Outcome::TimedOut => {
                let _ = core.registry.mark_timeout(queued.id, "task exceeded its timeout");
                info!(worker = index, task_id = %queued.id, "task timed out");
                core.propagate_dependency_failure(queued.id);
            }
        }
        *current_task.lock().await = None;
    }
    info!(worker = index, "worker stopped");
}
