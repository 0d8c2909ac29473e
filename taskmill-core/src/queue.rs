//! The priority-ordered handoff queue between the supervisor's release
//! logic and the worker pool.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use taskmill_shared::ids::TaskId;
use tokio::sync::Notify;

use crate::task::{Priority, TaskFn};

/// A task that has passed its dependency check and is waiting for a
/// worker. Carries the work unit itself — the only place a [`TaskFn`]
/// lives between being handed to the scheduler and being run.
pub struct QueuedTask {
    pub id: TaskId,
    pub priority: Priority,
    seq: u64,
    pub func: TaskFn,
}

impl QueuedTask {
    fn new(id: TaskId, priority: Priority, seq: u64, func: TaskFn) -> Self {
        Self { id, priority, seq, func }
    }
}

// `BinaryHeap` is a max-heap; we want the smallest `priority` to pop
// first, with ties broken by earliest `seq`. Both comparisons are
// inverted from the field's natural order so that "more urgent" sorts
// as "greater."
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedTask {}

/// Priority-ordered, multi-producer/multi-consumer queue of ready
/// tasks. `pop` blocks up to a bounded timeout and returns `None` if
/// nothing arrived in time, so a worker can periodically check for
/// shutdown.
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    notify: Notify,
    seq: AtomicU64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Pushes a task, assigning it the next submission sequence number
    /// for FIFO tie-breaking among equal priorities.
    pub fn push(&self, id: TaskId, priority: Priority, func: TaskFn) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().unwrap().push(QueuedTask::new(id, priority, seq, func));
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks up to `timeout` for a ready task. Returns `None` on
    /// timeout (the "Timeout sentinel" of the original interface).
    pub async fn pop(&self, timeout: Duration) -> Option<QueuedTask> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(task) = self.heap.lock().unwrap().pop() {
                return Some(task);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let notified = self.notify.notified();
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return None;
            }
            // Woken by a push (or a spurious notify_waiters fan-out);
            // loop back around to re-check the heap under the lock.
        }
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::boxed_task;

    fn noop_task() -> TaskFn {
        boxed_task(|| async { Ok::<_, String>(serde_json::Value::Null) })
    }

    #[tokio::test]
    async fn pops_in_priority_order() {
        let queue = ReadyQueue::new();
        let low = TaskId::new();
        let high = TaskId::new();
        let mid = TaskId::new();
        queue.push(low, 10, noop_task());
        queue.push(high, 1, noop_task());
        queue.push(mid, 5, noop_task());

        let first = queue.pop(Duration::from_millis(10)).await.unwrap();
        let second = queue.pop(Duration::from_millis(10)).await.unwrap();
        let third = queue.pop(Duration::from_millis(10)).await.unwrap();

        assert_eq!(first.id, high);
        assert_eq!(second.id, mid);
        assert_eq!(third.id, low);
    }

    #[tokio::test]
    async fn equal_priority_breaks_tie_by_submission_order() {
        let queue = ReadyQueue::new();
        let first_in = TaskId::new();
        let second_in = TaskId::new();
        queue.push(first_in, 5, noop_task());
        queue.push(second_in, 5, noop_task());

        let first = queue.pop(Duration::from_millis(10)).await.unwrap();
        let second = queue.pop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.id, first_in);
        assert_eq!(second.id, second_in);
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let queue = ReadyQueue::new();
        let result = queue.pop(Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn pop_wakes_up_as_soon_as_a_task_is_pushed() {
        let queue = std::sync::Arc::new(ReadyQueue::new());
        let queue_clone = queue.clone();
        let id = TaskId::new();

        let popper = tokio::spawn(async move { queue_clone.pop(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(id, 5, noop_task());

        let popped = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .expect("pop should return promptly after push")
            .unwrap();
        assert_eq!(popped.unwrap().id, id);
    }
}
