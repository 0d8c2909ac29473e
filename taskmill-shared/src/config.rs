/// Configuration for the scheduler, loaded from the environment.
///
/// # Environment Variables
///
/// - `TASKMILL_NUM_WORKERS`: initial worker pool size (default: 4)
/// - `TASKMILL_POP_TIMEOUT_MS`: ready-queue pop timeout in milliseconds,
///   i.e. how often an idle worker wakes up to check for shutdown
///   (default: 1000)
/// - `TASKMILL_MONITOR_INTERVAL_MS`: default poll interval for
///   `wait_completion` when the caller wants a sensible default
///   (default: 200)
/// - `RUST_LOG`: log level (default: info)
///
/// # Example
///
/// ```no_run
/// use taskmill_shared::config::SchedulerConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = SchedulerConfig::from_env()?;
/// println!("Starting with {} workers", config.num_workers);
/// # Ok(())
/// # }
/// ```
use std::env;
use std::time::Duration;

/// Complete scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker slots to start with.
    pub num_workers: usize,

    /// How long an idle worker blocks on the ready queue before
    /// checking for shutdown.
    pub pop_timeout: Duration,

    /// Default poll interval for `wait_completion`.
    pub monitor_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            pop_timeout: Duration::from_millis(1000),
            monitor_interval: Duration::from_millis(200),
        }
    }
}

impl SchedulerConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Unlike a database URL or a signing secret, none of these values
    /// are required for correctness, so a missing or unparsable
    /// variable falls back to its default rather than failing startup —
    /// except a value that parses but is out of range, which is a
    /// configuration mistake worth surfacing.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let num_workers = match env::var("TASKMILL_NUM_WORKERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("TASKMILL_NUM_WORKERS must be a positive integer"))?,
            Err(_) => defaults.num_workers,
        };
        if num_workers == 0 {
            anyhow::bail!("TASKMILL_NUM_WORKERS must be at least 1");
        }

        let pop_timeout_ms = match env::var("TASKMILL_POP_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("TASKMILL_POP_TIMEOUT_MS must be a positive integer"))?,
            Err(_) => defaults.pop_timeout.as_millis() as u64,
        };

        let monitor_interval_ms = match env::var("TASKMILL_MONITOR_INTERVAL_MS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("TASKMILL_MONITOR_INTERVAL_MS must be a positive integer")
            })?,
            Err(_) => defaults.monitor_interval.as_millis() as u64,
        };

        Ok(Self {
            num_workers,
            pop_timeout: Duration::from_millis(pop_timeout_ms),
            monitor_interval: Duration::from_millis(monitor_interval_ms),
        })
    }
}
