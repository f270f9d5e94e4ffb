//! Coarse task state and status snapshots used for reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Externally visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Unknown,
    Idle,
    Running,
    Stopped,
    Error,
    Disabled,
}

impl TaskState {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
            Self::Disabled => "Disabled",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

/// Status of a registered task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_name: String,
    /// Result of `check()` when the status was taken.
    pub executable: bool,
    pub child_task_count: usize,
    pub state: TaskState,
    pub last_execute_time: Option<DateTime<Utc>>,
    pub execute_count: u64,
    pub error_count: u64,
}

impl TaskStatus {
    pub fn new(task_name: impl Into<String>, executable: bool, child_task_count: usize) -> Self {
        Self {
            task_name: task_name.into(),
            executable,
            child_task_count,
            state: TaskState::Unknown,
            last_execute_time: None,
            execute_count: 0,
            error_count: 0,
        }
    }

    /// Status for a task that is not known.
    pub fn create_default(task_name: impl Into<String>) -> Self {
        Self::new(task_name, false, 0)
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_unknown() {
        let status = TaskStatus::create_default("missing");
        assert_eq!(status.state, TaskState::Unknown);
        assert!(!status.executable);
        assert_eq!(status.child_task_count, 0);
    }

    #[test]
    fn with_state_keeps_counts() {
        let status = TaskStatus::new("a", true, 2).with_state(TaskState::Stopped);
        assert_eq!(status.state, TaskState::Stopped);
        assert_eq!(status.child_task_count, 2);
        assert_eq!(status.execute_count, 0);
        assert!(status.last_execute_time.is_none());
    }

    #[test]
    fn state_serde() {
        let json = serde_json::to_string(&TaskState::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Idle.description(), "Idle");
    }
}
