//! Task registry: lookup of tasks by name with bulk start/stop.
//!
//! Pass a `TaskRegistry` explicitly where possible. `TaskRegistry::global()`
//! exists for the outermost composition point (e.g. `main`).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use tokio::sync::RwLock;

use crate::error::{TaskError, panic_message};
use crate::logging;
use crate::task::{Task, TaskState, TaskStatistics, TaskStatus};

const TAG: &str = "TaskRegistry";

static GLOBAL_REGISTRY: LazyLock<TaskRegistry> = LazyLock::new(TaskRegistry::new);

/// Registry of named tasks.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<Task>>>,
    initialized: AtomicBool,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static TaskRegistry {
        &GLOBAL_REGISTRY
    }

    /// Mark the registry initialized. Returns `true` only on the first call.
    pub fn initialize(&self) -> bool {
        let first = self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            logging::runtime(TAG, "Task registry initialized");
        }
        first
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register a task under its name. Returns the task it replaced, if any.
    pub async fn register_task(&self, task: Arc<Task>) -> Option<Arc<Task>> {
        let name = task.name().to_string();
        let previous = self.tasks.write().await.insert(name.clone(), task);
        logging::runtime(TAG, &format!("Registered task: {name}"));
        previous
    }

    /// Remove a task from the registry without stopping it.
    pub async fn unregister_task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.write().await.remove(name)
    }

    pub async fn get_task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.read().await.get(name).cloned()
    }

    pub async fn task_names(&self) -> Vec<String> {
        self.tasks.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<(String, Arc<Task>)> {
        self.tasks
            .read()
            .await
            .iter()
            .map(|(name, task)| (name.clone(), Arc::clone(task)))
            .collect()
    }

    /// Start the named task. Returns `false` if it is missing or starting it panicked.
    pub async fn start_task(&self, name: &str, force: bool) -> bool {
        let Some(task) = self.get_task(name).await else {
            let err = TaskError::NotFound {
                name: name.to_string(),
            };
            logging::runtime(TAG, &err.to_string());
            return false;
        };

        match AssertUnwindSafe(task.start(force)).catch_unwind().await {
            Ok(outcome) => {
                logging::runtime(TAG, &format!("Start requested for {name}: {outcome:?}"));
                true
            }
            Err(payload) => {
                logging::error(
                    TAG,
                    &format!(
                        "Starting task {name} panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                );
                false
            }
        }
    }

    /// Stop the named task. Returns `false` if it is missing.
    pub async fn stop_task(&self, name: &str) -> bool {
        let Some(task) = self.get_task(name).await else {
            return false;
        };
        task.stop().await;
        logging::runtime(TAG, &format!("Stopped task: {name}"));
        true
    }

    /// Start every registered task. One failing task does not affect the rest.
    pub async fn start_all_tasks(&self, force: bool) {
        logging::runtime(TAG, &format!("Starting all tasks (force: {force})"));
        for (name, task) in self.snapshot().await {
            if let Err(payload) = AssertUnwindSafe(task.start(force)).catch_unwind().await {
                logging::error(
                    TAG,
                    &format!(
                        "Starting task {name} panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                );
            }
        }
    }

    /// Stop every registered task. One failing task does not affect the rest.
    pub async fn stop_all_tasks(&self) {
        logging::runtime(TAG, "Stopping all tasks");
        for (name, task) in self.snapshot().await {
            if let Err(payload) = AssertUnwindSafe(task.stop()).catch_unwind().await {
                logging::error(
                    TAG,
                    &format!(
                        "Stopping task {name} panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                );
            }
        }
    }

    /// Status of the named task, computed now.
    pub async fn get_task_status(&self, name: &str) -> TaskStatus {
        match self.get_task(name).await {
            Some(task) => status_of(name, &task).await,
            None => TaskStatus::create_default(name),
        }
    }

    pub async fn get_all_task_status(&self) -> HashMap<String, TaskStatus> {
        let mut statuses = HashMap::new();
        for (name, task) in self.snapshot().await {
            let status = status_of(&name, &task).await;
            statuses.insert(name, status);
        }
        statuses
    }

    pub async fn all_statistics(&self) -> Vec<TaskStatistics> {
        let mut stats = Vec::new();
        for (_, task) in self.snapshot().await {
            stats.push(task.statistics().await);
        }
        stats
    }

    /// Stop all tasks, clear the registry and reset the initialized flag.
    pub async fn cleanup(&self) {
        self.stop_all_tasks().await;
        self.tasks.write().await.clear();
        self.initialized.store(false, Ordering::SeqCst);
        logging::runtime(TAG, "Task registry cleaned up");
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn status_of(name: &str, task: &Task) -> TaskStatus {
    let executable = std::panic::catch_unwind(AssertUnwindSafe(|| task.check())).unwrap_or(false);
    let child_task_count = task.count_child_task().await;

    let state = if task.is_running() {
        TaskState::Running
    } else if !executable {
        TaskState::Disabled
    } else if task.last_run_failed() {
        TaskState::Error
    } else if task.execute_count() > 0 {
        TaskState::Stopped
    } else {
        TaskState::Idle
    };

    TaskStatus {
        last_execute_time: task.last_execute_time(),
        execute_count: task.execute_count(),
        error_count: task.error_count(),
        ..TaskStatus::new(name, executable, child_task_count).with_state(state)
    }
}
