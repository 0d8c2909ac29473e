//! Forcible timeout enforcement for task execution.
//!
//! The original reference checks elapsed wall-clock time only after a
//! task body returns, which cannot actually bound how long a task runs.
//! This implementation instead runs the body as its own spawned task
//! and aborts it the instant the deadline passes: the aborted future is
//! dropped and can never reach [`TaskStatus::Completed`], which is the
//! guarantee the timeout semantics require. Documented here per the
//! expectation that an implementer state whether their timeout is
//! cooperative or forcible — this one is forcible.

use std::time::Duration;

use crate::task::{TaskFuture, TaskOutput};

/// Outcome of running a task body to completion or to its deadline.
pub enum Outcome {
    Completed(TaskOutput),
    Failed(String),
    TimedOut,
}

/// Runs `future` to completion, or aborts it once `timeout` elapses.
///
/// With `timeout = None` the future simply runs to completion on the
/// current task (no extra spawn needed). With a timeout configured, the
/// future is spawned onto its own task so it can be aborted
/// independently of the awaiting worker loop.
pub async fn run_with_timeout(timeout: Option<Duration>, future: TaskFuture) -> Outcome {
    match timeout {
        None => match future.await {
            Ok(value) => Outcome::Completed(value),
            Err(err) => Outcome::Failed(err),
        },
        Some(duration) => {
            let handle = tokio::spawn(future);
            let abort_handle = handle.abort_handle();

            match tokio::time::timeout(duration, handle).await {
                Ok(Ok(Ok(value))) => Outcome::Completed(value),
                Ok(Ok(Err(err))) => Outcome::Failed(err),
                Ok(Err(join_err)) => {
                    if join_err.is_cancelled() {
                        Outcome::TimedOut
                    } else {
                        Outcome::Failed(format!("task panicked: {join_err}"))
                    }
                }
                Err(_elapsed) => {
                    abort_handle.abort();
                    Outcome::TimedOut
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::boxed_task;

    #[tokio::test]
    async fn completes_within_timeout() {
        let future: TaskFuture = Box::pin(async { Ok::<_, String>(serde_json::json!(8)) });
        let outcome = run_with_timeout(Some(Duration::from_millis(100)), future).await;
        assert!(matches!(outcome, Outcome::Completed(v) if v == serde_json::json!(8)));
    }

    #[tokio::test]
    async fn propagates_task_failure() {
        let future: TaskFuture = Box::pin(async { Err::<serde_json::Value, _>("boom".to_string()) });
        let outcome = run_with_timeout(Some(Duration::from_millis(100)), future).await;
        assert!(matches!(outcome, Outcome::Failed(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn aborts_a_task_that_overruns_its_deadline() {
        let func = boxed_task(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(())
        });
        let future = func();
        let started = tokio::time::Instant::now();
        let outcome = run_with_timeout(Some(Duration::from_millis(30)), future).await;
        assert!(matches!(outcome, Outcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn no_timeout_runs_to_completion() {
        let func = boxed_task(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, String>(42)
        });
        let outcome = run_with_timeout(None, func()).await;
        assert!(matches!(outcome, Outcome::Completed(v) if v == serde_json::json!(42)));
    }
}
