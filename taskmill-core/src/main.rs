//! # Taskmill Demo
//!
//! Exercises the scheduler end-to-end: submits a small dependency
//! graph, watches it run to completion, and prints a status report.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskmill-core --bin taskmill-demo
//! ```

use std::time::Duration;

use taskmill_core::{Scheduler, SubmitOptions};
use taskmill_shared::config::SchedulerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskmill_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SchedulerConfig::from_env()?;
    tracing::info!(num_workers = config.num_workers, "taskmill starting");

    let scheduler = Scheduler::new(config).await;

    let a = scheduler.submit(
        || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, String>(5 + 3)
        },
        SubmitOptions::default(),
    )?;

    let b = scheduler.submit(
        || async { Ok::<_, String>("fetched dataset") },
        SubmitOptions { priority: 1, dependencies: vec![a], ..Default::default() },
    )?;

    let _c = scheduler.submit(
        || async { Err::<(), _>("disk full") },
        SubmitOptions { priority: 10, ..Default::default() },
    )?;

    scheduler.wait_completion(Duration::from_millis(50)).await;

    let report = scheduler.status().await;
    tracing::info!(?report, "final status");
    println!("{}", serde_json::to_string_pretty(&report)?);

    for id in [a, b] {
        if let Some(snapshot) = scheduler.get(id) {
            println!("{id}: {} -> {:?}", snapshot.status, snapshot.result);
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
