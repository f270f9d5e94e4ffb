//! Immutable statistics snapshot of a task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of a task's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub task_id: String,
    pub is_running: bool,
    /// Start of the most recent execution.
    pub start_time: Option<DateTime<Utc>>,
    pub last_execute_time: Option<DateTime<Utc>>,
    pub execute_count: u64,
    pub error_count: u64,
    /// Total wall time spent executing, including the in-flight run.
    pub run_duration_ms: u64,
    pub child_task_count: usize,
    /// Average of the most recent completed runs, in milliseconds.
    pub recent_average_ms: f64,
    pub last_error: Option<String>,
}

impl TaskStatistics {
    /// Fraction of executions that did not fail, in `0.0..=1.0`. Zero when never executed.
    pub fn success_rate(&self) -> f64 {
        if self.execute_count == 0 {
            return 0.0;
        }
        let succeeded = self.execute_count.saturating_sub(self.error_count);
        succeeded as f64 / self.execute_count as f64
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    /// Total run duration divided by execution count.
    pub fn average_execution_time(&self) -> Duration {
        if self.execute_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.run_duration_ms / self.execute_count)
    }

    pub fn formatted_run_duration(&self) -> String {
        format_duration(self.run_duration())
    }
}

/// Render a duration as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

impl std::fmt::Display for TaskStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Task: {}", self.task_id)?;
        writeln!(
            f,
            "Status: {}",
            if self.is_running { "running" } else { "stopped" }
        )?;
        writeln!(f, "Executions: {}", self.execute_count)?;
        writeln!(f, "Errors: {}", self.error_count)?;
        writeln!(f, "Success rate: {:.2}%", self.success_rate() * 100.0)?;
        writeln!(f, "Run duration: {}", self.formatted_run_duration())?;
        write!(f, "Child tasks: {}", self.child_task_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(execute_count: u64, error_count: u64, run_duration_ms: u64) -> TaskStatistics {
        TaskStatistics {
            task_id: "t".to_string(),
            is_running: false,
            start_time: None,
            last_execute_time: None,
            execute_count,
            error_count,
            run_duration_ms,
            child_task_count: 0,
            recent_average_ms: 0.0,
            last_error: None,
        }
    }

    #[test]
    fn success_rate_zero_when_never_executed() {
        let s = stats(0, 0, 0);
        assert_eq!(s.success_rate(), 0.0);
        assert_eq!(s.average_execution_time(), Duration::ZERO);
    }

    #[test]
    fn success_rate_and_average() {
        let s = stats(4, 1, 400);
        assert_eq!(s.success_rate(), 0.75);
        assert_eq!(s.average_execution_time(), Duration::from_millis(100));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }

    #[test]
    fn display_summary() {
        let text = stats(2, 1, 1500).to_string();
        assert!(text.contains("Task: t"));
        assert!(text.contains("Success rate: 50.00%"));
        assert!(text.contains("Run duration: 1s"));
    }
}
