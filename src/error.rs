//! Error types for taskhive.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Task lifecycle errors.
///
/// These never escape `Task::start`; they are recorded in the task's
/// counters and logs and surface only through statistics.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {name} not found")]
    NotFound { name: String },

    #[error("Task {id} failed: {reason}")]
    ExecutionFailed { id: String, reason: String },

    #[error("Task {id} panicked: {reason}")]
    Panicked { id: String, reason: String },

    #[error("Task {id} did not stop within {timeout:?}")]
    StopTimeout { id: String, timeout: Duration },
}

impl TaskError {
    /// Failure message recorded in task statistics.
    pub fn reason(&self) -> String {
        match self {
            Self::ExecutionFailed { reason, .. } => reason.clone(),
            Self::Panicked { reason, .. } => format!("panicked: {reason}"),
            other => other.to_string(),
        }
    }
}

/// Executor submission and execution errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    #[error("Executor {name} is shut down")]
    ShutDown { name: String },

    #[error("Executor {name} rejected work: queue full ({capacity} slots)")]
    Rejected { name: String, capacity: usize },

    #[error("Work failed: {reason}")]
    Failed { reason: String },

    #[error("Work panicked: {reason}")]
    Panicked { reason: String },

    #[error("Work was cancelled")]
    Cancelled,
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
