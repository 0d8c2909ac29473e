//! Ties the registry and ready queue together: the submission path, the
//! dependency-release sweep, and dependency-failure propagation. Shared
//! by [`crate::scheduler::Scheduler`] (submission) and
//! `crate::worker::run` (post-execution sweeps), so it lives on its own
//! rather than on either.

use std::collections::HashMap;
use std::sync::Mutex;

use taskmill_shared::ids::TaskId;
use tracing::debug;

use crate::queue::ReadyQueue;
use crate::registry::TaskRegistry;
use crate::task::{SubmitOptions, TaskFn};

/// The shared state a submission and a worker both need: the registry,
/// the ready queue, and the table of work units still waiting on
/// unsatisfied dependencies.
pub struct SchedulerCore {
    pub registry: TaskRegistry,
    pub queue: ReadyQueue,
    pending_funcs: Mutex<HashMap<TaskId, TaskFn>>,
}

impl SchedulerCore {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            queue: ReadyQueue::new(),
            pending_funcs: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new task and unconditionally parks its work unit in
    /// the pending table, then attempts to release it immediately.
    ///
    /// The closure is always inserted into `pending_funcs` *before* the
    /// dependency check, and `try_release` is the only path — shared
    /// with [`Self::release_ready`] — that ever moves a task out of
    /// that table and onto the ready queue. This closes a race where a
    /// dependency could complete (and sweep) in the window between this
    /// task's registry insert and its dependency check: without a
    /// shared claim routine, that sweep would see the task as
    /// PENDING-and-unqueued with satisfied dependencies but find
    /// nothing yet in `pending_funcs` to claim, and submission would
    /// then park the closure after the only sweep that would ever have
    /// released it. Inserting first and always calling `try_release`
    /// afterward guarantees this call's own attempt sees its own
    /// closure, so at least one of "this call" or "the sweep triggered
    /// by the dependency's completion" always wins the race.
    pub fn submit(&self, id: TaskId, options: &SubmitOptions, func: TaskFn) {
        self.registry
            .insert(id, options)
            .expect("freshly generated task id collided — astronomically unlikely");

        self.pending_funcs.lock().unwrap().insert(id, func);
        self.try_release(id);
    }

    fn enqueue(&self, id: TaskId, priority: i32, func: TaskFn) {
        self.registry.mark_queued(id);
        self.queue.push(id, priority, func);
    }

    /// Claims `id`'s parked closure and pushes it to the ready queue iff
    /// its dependencies are satisfied and no other caller has claimed it
    /// yet. Race-safe and idempotent: the `pending_funcs` removal is the
    /// single point of truth for "has this task been released," so two
    /// concurrent callers (e.g. `submit` and a sweep) racing on the same
    /// id can both check `dependencies_satisfied` and agree, but only
    /// one will find the closure still present to remove.
    fn try_release(&self, id: TaskId) {
        let Ok(snapshot) = self.registry.get(id) else { return };
        if !self.registry.dependencies_satisfied(&snapshot.dependencies) {
            return;
        }
        let Some(func) = self.pending_funcs.lock().unwrap().remove(&id) else {
            // Already claimed by another caller; mark_queued's
            // idempotence plus this removal keeps invariant Q1.
            return;
        };
        debug!(task_id = %id, "releasing task to ready queue");
        self.enqueue(id, snapshot.priority, func);
    }

    /// Walks every PENDING, not-yet-queued task and attempts to release
    /// each one. Triggered after every transition to COMPLETED.
    pub fn release_ready(&self) {
        for id in self.registry.pending_unqueued_ids() {
            self.try_release(id);
        }
    }

    /// Cancels every PENDING task that (transitively) depends on
    /// `failed_id`, because `failed_id` ended in a non-COMPLETED
    /// terminal state. Recurses until a pass produces no new
    /// cancellations, since cancelling a dependent can itself release
    /// further dependents.
    pub fn propagate_dependency_failure(&self, failed_id: TaskId) {
        let mut frontier = vec![failed_id];
        while let Some(id) = frontier.pop() {
            for dependent in self.registry.pending_dependents_of(id) {
                if self.pending_funcs.lock().unwrap().remove(&dependent).is_none() {
                    // Already queued (and thus already past the PENDING
                    // check inside mark_dependency_failed) or already
                    // terminal; nothing to do.
                    continue;
                }
                debug!(task_id = %dependent, failed_dependency = %id, "cancelling dependent of failed task");
                let _ = self.registry.mark_dependency_failed(dependent, id);
                frontier.push(dependent);
            }
        }
    }
}

impl Default for SchedulerCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{boxed_task, TaskStatus};

    fn noop() -> TaskFn {
        boxed_task(|| async { Ok::<_, String>(serde_json::Value::Null) })
    }

    #[test]
    fn task_without_dependencies_is_queued_immediately() {
        let core = SchedulerCore::new();
        let id = TaskId::new();
        core.submit(id, &SubmitOptions::default(), noop());
        assert_eq!(core.queue.len(), 1);
    }

    #[tokio::test]
    async fn task_with_unmet_dependency_waits_off_queue() {
        let core = SchedulerCore::new();
        let dep = TaskId::new();
        core.submit(dep, &SubmitOptions::default(), noop());
        core.queue.pop(std::time::Duration::from_millis(10)).await;

        let dependent = TaskId::new();
        let options = SubmitOptions { dependencies: vec![dep], ..Default::default() };
        core.submit(dependent, &options, noop());
        assert_eq!(core.queue.len(), 0);
    }

    #[tokio::test]
    async fn release_ready_queues_tasks_whose_dependency_just_completed() {
        let core = SchedulerCore::new();
        let dep = TaskId::new();
        core.submit(dep, &SubmitOptions::default(), noop());
        core.queue.pop(std::time::Duration::from_millis(10)).await;

        let dependent = TaskId::new();
        let options = SubmitOptions { dependencies: vec![dep], ..Default::default() };
        core.submit(dependent, &options, noop());

        core.registry.mark_running(dep).unwrap();
        core.registry.mark_completed(dep, serde_json::Value::Null).unwrap();
        core.release_ready();

        assert_eq!(core.queue.len(), 1);
    }

    #[tokio::test]
    async fn propagate_dependency_failure_cancels_pending_dependents_transitively() {
        let core = SchedulerCore::new();
        let root = TaskId::new();
        core.submit(root, &SubmitOptions::default(), noop());
        core.queue.pop(std::time::Duration::from_millis(10)).await;
        core.registry.mark_running(root).unwrap();
        core.registry.mark_failed(root, "boom").unwrap();

        let child = TaskId::new();
        let child_options = SubmitOptions { dependencies: vec![root], ..Default::default() };
        core.submit(child, &child_options, noop());

        let grandchild = TaskId::new();
        let grandchild_options = SubmitOptions { dependencies: vec![child], ..Default::default() };
        core.submit(grandchild, &grandchild_options, noop());

        core.propagate_dependency_failure(root);

        assert_eq!(core.registry.get(child).unwrap().status, TaskStatus::Cancelled);
        assert_eq!(core.registry.get(grandchild).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn submit_still_releases_a_task_whose_dependency_completes_mid_submission() {
        // Regression test: a dependency that completes (and sweeps) in
        // the window between a dependent's registry insert and its own
        // dependency check must not strand the dependent in PENDING.
        let core = SchedulerCore::new();
        let dep = TaskId::new();
        core.submit(dep, &SubmitOptions::default(), noop());
        core.queue.pop(std::time::Duration::from_millis(10)).await;
        core.registry.mark_running(dep).unwrap();
        core.registry.mark_completed(dep, serde_json::Value::Null).unwrap();

        // Simulate a sweep racing ahead of the dependent's own
        // submission: nothing is parked in `pending_funcs` yet, so this
        // finds no closure to claim and must not be the only chance the
        // dependent gets.
        core.release_ready();

        let dependent = TaskId::new();
        let options = SubmitOptions { dependencies: vec![dep], ..Default::default() };
        core.submit(dependent, &options, noop());

        assert_eq!(core.queue.len(), 1);
        assert_eq!(core.registry.get(dependent).unwrap().status, TaskStatus::Pending);
    }
}
