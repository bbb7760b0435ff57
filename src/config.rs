//! Engine configuration.
//!
//! All settings come from the environment with sensible defaults, so the
//! engine can boot inside a container with nothing but `TASKMILL_*`
//! variables set. If the broker host and port are both absent the
//! distributed half of the engine stays disabled: `schedule` calls still
//! buffer locally but are never persisted, and no workers start.

use crate::error::{Result, TaskmillError};
use std::time::Duration;

/// Connection settings for the durable broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: String,
    pub db: i64,
    /// Number of multiplexed connections kept for non-blocking commands.
    pub pool_size: usize,
    /// Connect/response timeout applied to pooled connections.
    pub pool_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            password: String::new(),
            db: 0,
            pool_size: 10,
            pool_timeout: Duration::from_secs(5),
        }
    }
}

impl BrokerConfig {
    /// `host:port` when both are configured, `None` otherwise.
    pub fn addr(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("{host}:{port}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskmillConfig {
    pub broker: BrokerConfig,
    /// Number of concurrent worker loops. Defaults to the number of
    /// available processing units.
    pub worker_threads: usize,
    /// Append-only file for the task outcome log; `None` means stdout.
    pub task_log_file: Option<String>,
    /// Sleep between promotion-loop polls when the local buffer is empty.
    pub promotion_idle_sleep: Duration,
    /// Backoff after a failed write to the durable scored set.
    pub promotion_retry_backoff: Duration,
    /// Delay before retrying after a failed blocking pop.
    pub pop_failure_delay: Duration,
}

impl Default for TaskmillConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            worker_threads: num_cpus::get(),
            task_log_file: None,
            promotion_idle_sleep: Duration::from_millis(100),
            promotion_retry_backoff: Duration::from_millis(500),
            pop_failure_delay: Duration::from_secs(1),
        }
    }
}

impl TaskmillConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("TASKMILL_REDIS_HOST") {
            if !host.is_empty() {
                config.broker.host = Some(host);
            }
        }

        if let Ok(port) = std::env::var("TASKMILL_REDIS_PORT") {
            config.broker.port = Some(port.parse().map_err(|e| {
                TaskmillError::ConfigurationError(format!("Invalid TASKMILL_REDIS_PORT: {e}"))
            })?);
        }

        if let Ok(password) = std::env::var("TASKMILL_REDIS_PASSWORD") {
            config.broker.password = password;
        }

        if let Ok(db) = std::env::var("TASKMILL_REDIS_DB") {
            config.broker.db = db.parse().map_err(|e| {
                TaskmillError::ConfigurationError(format!("Invalid TASKMILL_REDIS_DB: {e}"))
            })?;
        }

        if let Ok(pool_size) = std::env::var("TASKMILL_REDIS_POOL_SIZE") {
            let parsed: usize = pool_size.parse().map_err(|e| {
                TaskmillError::ConfigurationError(format!("Invalid TASKMILL_REDIS_POOL_SIZE: {e}"))
            })?;
            if parsed > 0 {
                config.broker.pool_size = parsed;
            }
        }

        if let Ok(timeout_ms) = std::env::var("TASKMILL_REDIS_POOL_TIMEOUT_MS") {
            let parsed: u64 = timeout_ms.parse().map_err(|e| {
                TaskmillError::ConfigurationError(format!(
                    "Invalid TASKMILL_REDIS_POOL_TIMEOUT_MS: {e}"
                ))
            })?;
            if parsed > 0 {
                config.broker.pool_timeout = Duration::from_millis(parsed);
            }
        }

        if let Ok(threads) = std::env::var("TASKMILL_WORKER_THREADS") {
            let parsed: usize = threads.parse().map_err(|e| {
                TaskmillError::ConfigurationError(format!("Invalid TASKMILL_WORKER_THREADS: {e}"))
            })?;
            if parsed > 0 {
                config.worker_threads = parsed;
            }
        }

        if let Ok(path) = std::env::var("TASKMILL_TASK_LOG_FILE") {
            if !path.is_empty() {
                config.task_log_file = Some(path);
            }
        }

        Ok(config)
    }
}
