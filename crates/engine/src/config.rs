use std::time::Duration;

/// Minimum slack between the longest transfer and the task visibility
/// timeout.
pub const VISIBILITY_MARGIN: Duration = Duration::from_secs(60);

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulated transfer duration (default: 10 s).
    pub transfer_delay: Duration,
    /// Upper bound applied to `transfer_delay` (default: 600 s).
    pub max_transfer_delay: Duration,
    /// Number of worker tasks in a [`WorkerPool`](crate::WorkerPool) (default: 2).
    pub worker_concurrency: usize,
    /// Deliveries per task before it is marked dead (default: 3).
    pub max_task_attempts: u32,
    /// Delay before a failed task becomes claimable again (default: 60 s).
    pub retry_delay: Duration,
    /// Idle poll interval of each worker (default: 1000 ms).
    pub poll_interval: Duration,
    /// How long a claimed PostgreSQL task stays invisible (default: 900 s).
    /// Must exceed `max_transfer_delay` by at least [`VISIBILITY_MARGIN`].
    pub visibility_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transfer_delay: Duration::from_secs(10),
            max_transfer_delay: Duration::from_secs(600),
            worker_concurrency: 2,
            max_task_attempts: 3,
            retry_delay: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            visibility_timeout: Duration::from_secs(900),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `TRANSFER_DELAY_SECS`          | `10`    |
    /// | `MAX_TRANSFER_DELAY_SECS`      | `600`   |
    /// | `WORKER_CONCURRENCY`           | `2`     |
    /// | `MAX_TASK_ATTEMPTS`            | `3`     |
    /// | `RETRY_DELAY_SECS`             | `60`    |
    /// | `POLL_INTERVAL_MS`             | `1000`  |
    /// | `TASK_VISIBILITY_TIMEOUT_SECS` | `900`   |
    ///
    /// Panics if a value does not parse or the combination fails
    /// [`validate`](Self::validate).
    pub fn from_env() -> Self {
        let transfer_delay_secs: u64 = std::env::var("TRANSFER_DELAY_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("TRANSFER_DELAY_SECS must be a valid u64");

        let max_transfer_delay_secs: u64 = std::env::var("MAX_TRANSFER_DELAY_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("MAX_TRANSFER_DELAY_SECS must be a valid u64");

        let worker_concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let max_task_attempts: u32 = std::env::var("MAX_TASK_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("MAX_TASK_ATTEMPTS must be a valid u32");

        let retry_delay_secs: u64 = std::env::var("RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("RETRY_DELAY_SECS must be a valid u64");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let visibility_timeout_secs: u64 = std::env::var("TASK_VISIBILITY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("TASK_VISIBILITY_TIMEOUT_SECS must be a valid u64");

        let config = Self {
            transfer_delay: Duration::from_secs(transfer_delay_secs),
            max_transfer_delay: Duration::from_secs(max_transfer_delay_secs),
            worker_concurrency: worker_concurrency.max(1),
            max_task_attempts: max_task_attempts.max(1),
            retry_delay: Duration::from_secs(retry_delay_secs),
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            visibility_timeout: Duration::from_secs(visibility_timeout_secs),
        };
        if let Err(msg) = config.validate() {
            panic!("{msg}");
        }
        config
    }

    /// A claimed task must stay invisible for longer than any transfer can
    /// run, otherwise the queue redelivers a job that is still executing.
    pub fn validate(&self) -> Result<(), String> {
        let required = self.max_transfer_delay + VISIBILITY_MARGIN;
        if self.visibility_timeout < required {
            return Err(format!(
                "TASK_VISIBILITY_TIMEOUT_SECS ({}) must be at least MAX_TRANSFER_DELAY_SECS + {} ({})",
                self.visibility_timeout.as_secs(),
                VISIBILITY_MARGIN.as_secs(),
                required.as_secs(),
            ));
        }
        Ok(())
    }

    /// The transfer delay after applying the upper bound.
    pub fn effective_transfer_delay(&self) -> Duration {
        self.transfer_delay.min(self.max_transfer_delay)
    }
}
