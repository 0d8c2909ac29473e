//! The supervisor facade: the public entry point that owns the worker
//! pool and routes submit/cancel/scale/monitor/status/wait/shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskmill_shared::config::SchedulerConfig;
use taskmill_shared::ids::TaskId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::SchedulerCore;
use crate::error::SchedulerError;
use crate::registry::StatusCounts;
use crate::task::{boxed_task, SubmitOptions, TaskSnapshot};
use crate::worker;

/// Number of alive vs. configured worker slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub alive: usize,
}

/// Snapshot returned by [`Scheduler::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub workers: WorkerCounts,
    pub tasks: StatusCounts,
}

struct WorkerSlot {
    index: usize,
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
    current_task: Arc<Mutex<Option<TaskId>>>,
}

/// Owns the worker pool bound to a shared [`SchedulerCore`] and exposes
/// the scheduler's public operations.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    slots: Mutex<Vec<WorkerSlot>>,
    config: SchedulerConfig,
    shutting_down: AtomicBool,
}

impl Scheduler {
    /// Builds a scheduler and starts `config.num_workers` worker slots.
    pub async fn new(config: SchedulerConfig) -> Self {
        let core = Arc::new(SchedulerCore::new());
        let scheduler = Self {
            core,
            slots: Mutex::new(Vec::new()),
            config,
            shutting_down: AtomicBool::new(false),
        };
        let mut slots = scheduler.slots.lock().await;
        for index in 0..scheduler.config.num_workers {
            slots.push(scheduler.spawn_slot(index));
        }
        drop(slots);
        scheduler
    }

    fn spawn_slot(&self, index: usize) -> WorkerSlot {
        let shutdown = CancellationToken::new();
        let current_task = Arc::new(Mutex::new(None));
        let core = self.core.clone();
        let token = shutdown.clone();
        let pop_timeout = self.config.pop_timeout;
        let current_task_for_worker = current_task.clone();
        let handle = tokio::spawn(worker::run(index, core, token, pop_timeout, current_task_for_worker));
        WorkerSlot { index, handle, shutdown, current_task }
    }

    /// Submits a work unit. `func` is invoked with no arguments once
    /// dispatched — positional/keyword arguments from the original
    /// interface are captured by the closure itself.
    pub fn submit<F, Fut, T, E>(&self, func: F, options: SubmitOptions) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize,
        E: std::fmt::Display,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShuttingDown);
        }
        let id = TaskId::new();
        self.core.submit(id, &options, boxed_task(func));
        Ok(id)
    }

    /// Returns the current snapshot for a task, if it exists.
    pub fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.core.registry.get(id).ok()
    }

    /// Cancels a PENDING task. Returns `false` for any other status or
    /// an unknown id.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.core.registry.try_cancel(id)
    }

    /// Resizes the worker pool. Growing spawns additional slots;
    /// shrinking forcibly terminates the excess (matching the
    /// reference's behavior) — any task an excess slot was running is
    /// marked FAILED with `"worker died"`, the same path worker death
    /// takes.
    pub async fn scale(&self, n: usize) -> Result<(), SchedulerError> {
        if n == 0 {
            return Err(SchedulerError::InvalidWorkerCount(n));
        }
        let mut slots = self.slots.lock().await;
        if n > slots.len() {
            for index in slots.len()..n {
                slots.push(self.spawn_slot(index));
            }
        } else if n < slots.len() {
            let excess = slots.split_off(n);
            drop(slots);
            for slot in excess {
                self.terminate_slot(slot).await;
            }
        }
        Ok(())
    }

    async fn terminate_slot(&self, slot: WorkerSlot) {
        slot.shutdown.cancel();
        slot.handle.abort();
        let orphaned = *slot.current_task.lock().await;
        let _ = slot.handle.await;
        if let Some(task_id) = orphaned {
            self.fail_if_still_running(task_id, "worker died");
        }
        info!(worker = slot.index, "worker terminated");
    }

    fn fail_if_still_running(&self, id: TaskId, reason: &str) {
        if let Ok(snapshot) = self.core.registry.get(id) {
            if snapshot.status == crate::task::TaskStatus::Running {
                let _ = self.core.registry.mark_failed(id, reason);
                self.core.propagate_dependency_failure(id);
                warn!(task_id = %id, "task orphaned by dead worker, marked failed");
            }
        }
    }

    /// Reaps and respawns any worker slot that died unexpectedly
    /// (panicked rather than being deliberately terminated).
    pub async fn monitor(&self) {
        let mut slots = self.slots.lock().await;
        for slot in slots.iter_mut() {
            if slot.handle.is_finished() {
                let orphaned = slot.current_task.try_lock().ok().and_then(|g| *g);
                if let Some(task_id) = orphaned {
                    self.fail_if_still_running(task_id, "worker died");
                }
                warn!(worker = slot.index, "worker died unexpectedly, respawning");
                *slot = self.spawn_slot(slot.index);
            }
        }
    }

    /// Returns a combined worker/task status report.
    pub async fn status(&self) -> StatusReport {
        let slots = self.slots.lock().await;
        let total = slots.len();
        let alive = slots.iter().filter(|s| !s.handle.is_finished()).count();
        StatusReport {
            workers: WorkerCounts { total, alive },
            tasks: self.core.registry.status_counts(),
        }
    }

    /// Blocks until no task is PENDING or RUNNING, calling `monitor` on
    /// every tick.
    pub async fn wait_completion(&self, check_interval: Duration) {
        loop {
            self.monitor().await;
            let counts = self.core.registry.status_counts();
            if counts.pending == 0 && counts.running == 0 {
                return;
            }
            tokio::time::sleep(check_interval).await;
        }
    }

    /// Terminates all workers and joins them. Does not drain the ready
    /// queue — tasks left PENDING stay PENDING for observability. The
    /// scheduler is not restartable afterward; subsequent `submit`
    /// calls return [`SchedulerError::ShuttingDown`].
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let mut slots = self.slots.lock().await;
        let all: Vec<_> = slots.drain(..).collect();
        drop(slots);
        for slot in all {
            self.terminate_slot(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_workers: usize) -> SchedulerConfig {
        SchedulerConfig { num_workers, pop_timeout: Duration::from_millis(50), monitor_interval: Duration::from_millis(20) }
    }

    #[tokio::test]
    async fn basic_execution_completes_with_result() {
        let scheduler = Scheduler::new(config(1)).await;
        let id = scheduler
            .submit(|| async { Ok::<_, String>(5 + 3) }, SubmitOptions::default())
            .unwrap();

        scheduler.wait_completion(Duration::from_millis(20)).await;

        let snapshot = scheduler.get(id).unwrap();
        assert_eq!(snapshot.status, crate::task::TaskStatus::Completed);
        assert_eq!(snapshot.result, Some(serde_json::json!(8)));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let scheduler = Scheduler::new(config(1)).await;
        scheduler.shutdown().await;
        let result = scheduler.submit(|| async { Ok::<_, String>(1) }, SubmitOptions::default());
        assert!(matches!(result, Err(SchedulerError::ShuttingDown)));
    }

    #[tokio::test]
    async fn scale_changes_alive_worker_count() {
        let scheduler = Scheduler::new(config(2)).await;
        scheduler.scale(5).await.unwrap();
        assert_eq!(scheduler.status().await.workers.alive, 5);

        scheduler.scale(3).await.unwrap();
        assert_eq!(scheduler.status().await.workers.alive, 3);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn scale_to_zero_is_rejected() {
        let scheduler = Scheduler::new(config(2)).await;
        let result = scheduler.scale(0).await;
        assert!(matches!(result, Err(SchedulerError::InvalidWorkerCount(0))));
        assert_eq!(scheduler.status().await.workers.alive, 2);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_of_pending_task_prevents_it_from_ever_running() {
        let scheduler = Scheduler::new(config(1)).await;
        // Keep the single worker busy so the next task stays PENDING/queued.
        let _busy = scheduler
            .submit(
                || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, String>(())
                },
                SubmitOptions::default(),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let quick = scheduler.submit(|| async { Ok::<_, String>(1) }, SubmitOptions::default()).unwrap();
        assert!(scheduler.cancel(quick));

        tokio::time::sleep(Duration::from_millis(250)).await;
        let snapshot = scheduler.get(quick).unwrap();
        assert_eq!(snapshot.status, crate::task::TaskStatus::Cancelled);
        scheduler.shutdown().await;
    }
}
