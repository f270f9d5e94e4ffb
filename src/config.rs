//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default time `Task::stop` waits for the task's own execution context.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default grace period for `TaskExecutor::shutdown`.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Per-task lifecycle configuration.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// How long `stop()` waits for the task's own execution context.
    pub stop_timeout: Duration,
    /// Number of recent runs kept for the rolling execution-time average.
    pub average_window: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            average_window: 10,
        }
    }
}

impl TaskConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stop_timeout: env_parse::<u64>("TASKHIVE_STOP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.stop_timeout),
            average_window: env_parse("TASKHIVE_AVERAGE_WINDOW").unwrap_or(defaults.average_window),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.average_window == 0 {
            return Err(ConfigError::InvalidValue {
                key: "average_window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Executor sizing. `None` limits mean elastic (unbounded) behaviour.
///
/// There is no core size: worker threads belong to the tokio runtime, so
/// `max_workers` only caps how many items run at once.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name used in logs and errors.
    pub name: String,
    /// Maximum number of work items running at once.
    pub max_workers: Option<usize>,
    /// Maximum number of work items admitted (running + waiting).
    pub queue_capacity: Option<usize>,
    /// Grace period `shutdown()` gives in-flight work.
    pub shutdown_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "task-executor".to_string(),
            max_workers: None,
            queue_capacity: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ExecutorConfig {
    /// Bounded pool with `max_workers` concurrent items and `queue_capacity` admission slots.
    pub fn bounded(max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            max_workers: Some(max_workers),
            queue_capacity: Some(queue_capacity),
            ..Self::default()
        }
    }

    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: std::env::var("TASKHIVE_EXECUTOR_NAME").unwrap_or(defaults.name),
            max_workers: env_parse("TASKHIVE_MAX_WORKERS"),
            queue_capacity: env_parse("TASKHIVE_QUEUE_CAPACITY"),
            shutdown_grace: env_parse::<u64>("TASKHIVE_SHUTDOWN_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "queue_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily rolling log files. Stderr only when `None`.
    pub log_dir: Option<PathBuf>,
    /// Whether `record` category messages are emitted.
    pub record_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_dir: None,
            record_enabled: true,
        }
    }
}

impl LogConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            filter: std::env::var("TASKHIVE_LOG").unwrap_or(defaults.filter),
            log_dir: std::env::var("TASKHIVE_LOG_DIR").ok().map(PathBuf::from),
            record_enabled: env_parse("TASKHIVE_RECORD_LOG").unwrap_or(defaults.record_enabled),
        }
    }
}
