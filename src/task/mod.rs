//! Task system: lifecycle, child trees and reporting snapshots.
//!
//! - `handler`: `TaskHandler` trait, `FnTask` closures, `TaskContext`
//! - `base`: `Task` with start/stop, child tasks and counters
//! - `stats`: `TaskStatistics` snapshot
//! - `status`: coarse `TaskState` / `TaskStatus` for reporting
//! - `average`: rolling average of recent run times

pub mod average;
pub mod base;
pub mod handler;
pub mod stats;
pub mod status;

pub use average::RollingAverage;
pub use base::{StartOutcome, Task};
pub use handler::{FnTask, TaskContext, TaskHandler};
pub use stats::TaskStatistics;
pub use status::{TaskState, TaskStatus};
