//! taskhive: hierarchical async tasks, a pool-backed executor and a task registry.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod registry;
pub mod task;

pub use config::{ExecutorConfig, LogConfig, TaskConfig};
pub use error::{ConfigError, Error, ExecutorError, Result, TaskError};
pub use executor::{CancellableTask, TaskExecutor, WorkHandle, WorkQueue};
pub use registry::TaskRegistry;
pub use task::{
    FnTask, StartOutcome, Task, TaskContext, TaskHandler, TaskState, TaskStatistics, TaskStatus,
};
