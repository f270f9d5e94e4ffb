//! Task lifecycle: start/stop, child tasks and execution counters.
//!
//! A `Task` owns at most one execution context (a spawned tokio task) at a
//! time plus a map of child tasks. `start`, `stop`, `add_child_task` and
//! `remove_child_task` are serialized by a per-task lock; locks are always
//! taken parent first, then child.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TaskConfig;
use crate::error::{ConfigError, TaskError, panic_message};
use crate::logging;
use crate::task::average::RollingAverage;
use crate::task::handler::{FnTask, TaskContext, TaskHandler};
use crate::task::stats::TaskStatistics;

const TAG: &str = "Task";

/// Outcome of `Task::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new execution context was spawned.
    Started,
    /// An execution context was alive and `force` was false.
    AlreadyRunning,
    /// `check()` returned false.
    PreconditionFailed,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

fn lock_std<T>(mutex: &StdMutex<T>) -> StdMutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// Execution counters, written by the execution context and read by anyone.
#[derive(Debug)]
struct Counters {
    running: AtomicBool,
    /// Bumped on every start so a stale execution cannot clear a newer one's flag.
    generation: AtomicU64,
    start_time: AtomicI64,
    last_execute_time: AtomicI64,
    current_run_start: AtomicI64,
    execute_count: AtomicU64,
    error_count: AtomicU64,
    total_run_ms: AtomicU64,
    last_failed: AtomicBool,
    last_error: StdMutex<Option<String>>,
    recent: StdMutex<RollingAverage>,
}

impl Counters {
    fn new(average_window: usize) -> Self {
        Self {
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            start_time: AtomicI64::new(0),
            last_execute_time: AtomicI64::new(0),
            current_run_start: AtomicI64::new(0),
            execute_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_run_ms: AtomicU64::new(0),
            last_failed: AtomicBool::new(false),
            last_error: StdMutex::new(None),
            recent: StdMutex::new(RollingAverage::new(average_window)),
        }
    }

    fn begin(&self) {
        let now = Utc::now().timestamp_millis();
        self.start_time.store(now, Ordering::SeqCst);
        self.last_execute_time.store(now, Ordering::SeqCst);
        self.current_run_start.store(now, Ordering::SeqCst);
        self.execute_count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, elapsed: Duration, error: Option<String>) {
        let ms = elapsed.as_millis() as u64;
        self.current_run_start.store(0, Ordering::SeqCst);
        self.total_run_ms.fetch_add(ms, Ordering::SeqCst);
        lock_std(&self.recent).push(ms);

        match error {
            Some(message) => {
                self.error_count.fetch_add(1, Ordering::SeqCst);
                self.last_failed.store(true, Ordering::SeqCst);
                *lock_std(&self.last_error) = Some(message);
            }
            None => self.last_failed.store(false, Ordering::SeqCst),
        }
    }

    fn in_flight_ms(&self) -> u64 {
        let started = self.current_run_start.load(Ordering::SeqCst);
        if started <= 0 {
            return 0;
        }
        (Utc::now().timestamp_millis() - started).max(0) as u64
    }

    fn snapshot(&self, task_id: &str, child_task_count: usize) -> TaskStatistics {
        TaskStatistics {
            task_id: task_id.to_string(),
            is_running: self.running.load(Ordering::SeqCst),
            start_time: millis_to_datetime(self.start_time.load(Ordering::SeqCst)),
            last_execute_time: millis_to_datetime(self.last_execute_time.load(Ordering::SeqCst)),
            execute_count: self.execute_count.load(Ordering::SeqCst),
            error_count: self.error_count.load(Ordering::SeqCst),
            run_duration_ms: self.total_run_ms.load(Ordering::SeqCst) + self.in_flight_ms(),
            child_task_count,
            recent_average_ms: lock_std(&self.recent).average(),
            last_error: lock_std(&self.last_error).clone(),
        }
    }
}

/// Resets the running flag on every exit path of an execution, including abort.
struct RunGuard {
    counters: Arc<Counters>,
    generation: u64,
    started: Instant,
    finished: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            // Aborted mid-run.
            let ms = self.started.elapsed().as_millis() as u64;
            self.counters.total_run_ms.fetch_add(ms, Ordering::SeqCst);
            self.counters.current_run_start.store(0, Ordering::SeqCst);
        }
        if self.counters.generation.load(Ordering::SeqCst) == self.generation {
            self.counters.running.store(false, Ordering::SeqCst);
        }
    }
}

/// Mutable lifecycle state guarded by the per-task lock.
#[derive(Default)]
struct TaskSlot {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    children: HashMap<String, Arc<Task>>,
}

impl TaskSlot {
    fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

async fn run_hooks(handler: &dyn TaskHandler, ctx: &TaskContext) -> anyhow::Result<()> {
    handler.before_run(ctx).await?;
    handler.run(ctx).await?;
    handler.after_run(ctx).await
}

async fn await_exit(id: &str, handle: JoinHandle<()>, timeout: Option<Duration>) {
    match timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, handle).await.is_err() {
                let err = TaskError::StopTimeout {
                    id: id.to_string(),
                    timeout: limit,
                };
                logging::runtime(TAG, &format!("{err}, abandoning it"));
            }
        }
        None => {
            let _ = handle.await;
        }
    }
}

/// A unit of work with a precondition, a body, hooks and owned child tasks.
pub struct Task {
    id: String,
    name: String,
    handler: Arc<dyn TaskHandler>,
    config: TaskConfig,
    counters: Arc<Counters>,
    parent_id: StdMutex<Option<String>>,
    slot: Mutex<TaskSlot>,
}

impl Task {
    /// Create an inert task around a handler.
    pub fn new(handler: impl TaskHandler + 'static) -> Self {
        Self::from_handler(Arc::new(handler))
    }

    pub fn from_handler(handler: Arc<dyn TaskHandler>) -> Self {
        let id = handler
            .id()
            .unwrap_or_else(|| format!("task-{}", Uuid::new_v4()));
        let config = TaskConfig::default();
        Self {
            name: id.clone(),
            id,
            handler,
            counters: Arc::new(Counters::new(config.average_window)),
            config,
            parent_id: StdMutex::new(None),
            slot: Mutex::new(TaskSlot::default()),
        }
    }

    /// Task whose body does nothing and whose check always passes.
    pub fn noop() -> Self {
        Self::new(FnTask::noop(None))
    }

    pub fn noop_with_id(id: impl Into<String>) -> Self {
        Self::new(FnTask::noop(Some(id.into())))
    }

    /// Inline task with a fixed ID, an always-true check and `body` as its run.
    pub fn from_fn<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(FnTask::new(Some(id.into()), body))
    }

    /// Registry name. Defaults to the ID.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the task's config. Fails if `config` does not validate.
    pub fn with_config(mut self, config: TaskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.counters = Arc::new(Counters::new(config.average_window));
        self.config = config;
        Ok(self)
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<String> {
        lock_std(&self.parent_id).clone()
    }

    fn set_parent(&self, parent: Option<String>) {
        *lock_std(&self.parent_id) = parent;
    }

    /// Evaluate the handler's precondition.
    pub fn check(&self) -> bool {
        self.handler.check()
    }

    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::SeqCst)
    }

    /// Whether an execution context exists and has not finished.
    pub async fn is_alive(&self) -> bool {
        self.slot.lock().await.is_alive()
    }

    pub fn execute_count(&self) -> u64 {
        self.counters.execute_count.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u64 {
        self.counters.error_count.load(Ordering::SeqCst)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.counters.start_time.load(Ordering::SeqCst))
    }

    pub fn last_execute_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.counters.last_execute_time.load(Ordering::SeqCst))
    }

    /// Whether the most recent completed execution failed.
    pub fn last_run_failed(&self) -> bool {
        self.counters.last_failed.load(Ordering::SeqCst)
    }

    /// Start the task, then its children.
    ///
    /// With `force`, a live execution context is stopped first; otherwise the
    /// call is a no-op while one is alive.
    pub async fn start(&self, force: bool) -> StartOutcome {
        self.start_boxed(force).await
    }

    fn start_boxed(&self, force: bool) -> BoxFuture<'_, StartOutcome> {
        Box::pin(async move {
            let mut slot = self.slot.lock().await;

            if slot.is_alive() {
                if !force {
                    logging::runtime(TAG, &format!("Task already running: {}", self.id));
                    return StartOutcome::AlreadyRunning;
                }
                logging::runtime(TAG, &format!("Force restarting task: {}", self.id));
                self.stop_locked(&mut slot, Some(self.config.stop_timeout))
                    .await;
            }

            if !self.handler.check() {
                logging::runtime(TAG, &format!("Task check failed, not starting: {}", self.id));
                return StartOutcome::PreconditionFailed;
            }

            let cancel = CancellationToken::new();
            let ctx = TaskContext::new(self.id.clone(), cancel.clone()).with_parent(self.parent_id());

            let generation = self.counters.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.running.store(true, Ordering::SeqCst);
            let guard = RunGuard {
                counters: Arc::clone(&self.counters),
                generation,
                started: Instant::now(),
                finished: false,
            };

            slot.handle = Some(self.spawn_execution(ctx, guard));
            slot.cancel = Some(cancel);
            logging::runtime(TAG, &format!("Task started: {}", self.id));

            let children: Vec<Arc<Task>> = slot.children.values().cloned().collect();
            for child in children {
                child.start_boxed(false).await;
            }

            StartOutcome::Started
        })
    }

    fn spawn_execution(&self, ctx: TaskContext, guard: RunGuard) -> JoinHandle<()> {
        let handler = Arc::clone(&self.handler);
        let counters = Arc::clone(&self.counters);
        let id = self.id.clone();
        logging::debug(TAG, &format!("Spawning execution context for {id}"));

        tokio::spawn(async move {
            let mut guard = guard;
            counters.begin();
            logging::runtime(TAG, &format!("Executing task: {id}"));

            let started = Instant::now();
            let result = AssertUnwindSafe(run_hooks(handler.as_ref(), &ctx))
                .catch_unwind()
                .await;
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(TaskError::ExecutionFailed {
                    id: id.clone(),
                    reason: format!("{e:#}"),
                }),
                Err(payload) => Some(TaskError::Panicked {
                    id: id.clone(),
                    reason: panic_message(payload.as_ref()),
                }),
            };

            counters.finish(started.elapsed(), failure.as_ref().map(TaskError::reason));
            guard.finished = true;

            match failure {
                None => logging::runtime(TAG, &format!("Task completed: {id}")),
                Some(e) => logging::error(TAG, &e.to_string()),
            }
            logging::runtime(TAG, &format!("Task finished: {id}"));
        })
    }

    /// Stop the task and drop all children.
    ///
    /// Waits up to the configured stop timeout (5s by default) for the task's
    /// own execution context, then waits without limit for each child.
    pub async fn stop(&self) {
        self.shutdown(Some(self.config.stop_timeout)).await;
    }

    fn shutdown(&self, timeout: Option<Duration>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut slot = self.slot.lock().await;
            self.stop_locked(&mut slot, timeout).await;
        })
    }

    async fn stop_locked(&self, slot: &mut TaskSlot, timeout: Option<Duration>) {
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }

        if let Some(handle) = slot.handle.take()
            && !handle.is_finished()
        {
            logging::runtime(TAG, &format!("Stopping task: {}", self.id));
            handle.abort();
            await_exit(&self.id, handle, timeout).await;
        }

        let children: Vec<Arc<Task>> = slot.children.drain().map(|(_, child)| child).collect();
        for child in children {
            child.shutdown(None).await;
            child.set_parent(None);
        }

        self.counters.running.store(false, Ordering::SeqCst);
        logging::runtime(TAG, &format!("Task stopped: {}", self.id));
    }

    /// Install `child`, stopping any previous child with the same ID first.
    pub async fn add_child_task(&self, child: Arc<Task>) {
        let child_id = child.id().to_string();
        if child_id == self.id {
            logging::error(TAG, &format!("Task {} cannot be its own child", self.id));
            return;
        }
        if self.is_in_subtree(&child).await {
            logging::error(
                TAG,
                &format!("Task {} is already a descendant of {child_id}", self.id),
            );
            return;
        }

        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.children.remove(&child_id) {
            logging::runtime(TAG, &format!("Replacing child task {child_id} of {}", self.id));
            previous.stop().await;
        }

        child.set_parent(Some(self.id.clone()));
        child.start_boxed(false).await;
        slot.children.insert(child_id.clone(), child);
        logging::runtime(TAG, &format!("Child task added to {}: {child_id}", self.id));
    }

    /// Stop and remove the named child, waiting for it to exit. No-op if absent.
    pub async fn remove_child_task(&self, child_id: &str) {
        let mut slot = self.slot.lock().await;

        let Some(child) = slot.children.get(child_id).cloned() else {
            return;
        };

        child.shutdown(None).await;
        child.set_parent(None);
        slot.children.remove(child_id);
        logging::runtime(TAG, &format!("Child task removed from {}: {child_id}", self.id));
    }

    /// Whether this task is `root` or one of its descendants.
    ///
    /// Each node is locked only long enough to copy its children, so the
    /// caller must not hold this task's lock.
    async fn is_in_subtree(&self, root: &Arc<Task>) -> bool {
        let mut pending = vec![Arc::clone(root)];
        let mut seen = HashSet::new();

        while let Some(task) = pending.pop() {
            if std::ptr::eq(Arc::as_ptr(&task), self) || task.id == self.id {
                return true;
            }
            if !seen.insert(Arc::as_ptr(&task) as usize) {
                continue;
            }
            let children: Vec<Arc<Task>> =
                task.slot.lock().await.children.values().cloned().collect();
            pending.extend(children);
        }
        false
    }

    pub async fn has_child_task(&self, child_id: &str) -> bool {
        self.slot.lock().await.children.contains_key(child_id)
    }

    pub async fn get_child_task(&self, child_id: &str) -> Option<Arc<Task>> {
        self.slot.lock().await.children.get(child_id).cloned()
    }

    pub async fn count_child_task(&self) -> usize {
        self.slot.lock().await.children.len()
    }

    pub async fn child_ids(&self) -> Vec<String> {
        self.slot.lock().await.children.keys().cloned().collect()
    }

    /// Snapshot of the task's counters.
    pub async fn statistics(&self) -> TaskStatistics {
        let child_task_count = self.count_child_task().await;
        self.counters.snapshot(&self.id, child_task_count)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("execute_count", &self.execute_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Handler recording hook invocations; fails `run` when asked to.
    struct Recorder {
        fail: bool,
        ready: bool,
        before: AtomicUsize,
        after: AtomicUsize,
    }

    impl Recorder {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                ready: true,
                before: AtomicUsize::new(0),
                after: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskHandler for Arc<Recorder> {
        fn id(&self) -> Option<String> {
            Some("recorder".to_string())
        }

        fn check(&self) -> bool {
            self.ready
        }

        async fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("run failed");
            }
            Ok(())
        }

        async fn before_run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            self.before.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn after_run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            self.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn wait_idle(task: &Task) {
        for _ in 0..200 {
            if !task.is_alive().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} never finished", task.id());
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let a = Task::noop();
        let b = Task::noop();
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("task-"));
        assert_eq!(Task::noop_with_id("fixed").id(), "fixed");
        assert_eq!(Task::noop_with_id("fixed").with_name("pretty").name(), "pretty");
    }

    #[tokio::test]
    async fn hooks_run_around_successful_body() {
        let recorder = Arc::new(Recorder::new(false));
        let task = Task::new(Arc::clone(&recorder));

        assert_eq!(task.start(false).await, StartOutcome::Started);
        wait_idle(&task).await;

        assert_eq!(recorder.before.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.after.load(Ordering::SeqCst), 1);
        assert_eq!(task.execute_count(), 1);
        assert_eq!(task.error_count(), 0);
        assert!(!task.is_running());
        assert!(!task.last_run_failed());
    }

    #[tokio::test]
    async fn after_run_skipped_on_failure() {
        let recorder = Arc::new(Recorder::new(true));
        let task = Task::new(Arc::clone(&recorder));

        task.start(false).await;
        wait_idle(&task).await;

        assert_eq!(recorder.before.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.after.load(Ordering::SeqCst), 0);
        assert_eq!(task.error_count(), 1);
        assert!(task.last_run_failed());

        let stats = task.statistics().await;
        assert_eq!(stats.last_error.as_deref(), Some("run failed"));
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[tokio::test]
    async fn failed_check_does_not_start() {
        let recorder = Arc::new(Recorder {
            ready: false,
            ..Recorder::new(false)
        });
        let task = Task::new(Arc::clone(&recorder));

        assert_eq!(task.start(false).await, StartOutcome::PreconditionFailed);
        assert!(!task.is_running());
        assert!(!task.is_alive().await);
        assert_eq!(task.execute_count(), 0);
    }

    #[tokio::test]
    async fn panic_in_body_is_counted() {
        let task = Task::from_fn("panicky", |_ctx| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        task.start(false).await;
        wait_idle(&task).await;

        assert_eq!(task.execute_count(), 1);
        assert_eq!(task.error_count(), 1);
        assert!(!task.is_running());
        let stats = task.statistics().await;
        assert!(stats.last_error.unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn restart_after_completion_creates_new_context() {
        let task = Task::noop_with_id("again");
        for _ in 0..3 {
            assert!(task.start(false).await.is_started());
            wait_idle(&task).await;
        }
        assert_eq!(task.execute_count(), 3);
    }

    #[tokio::test]
    async fn second_start_without_force_is_noop() {
        let task = Task::from_fn("long", |ctx| async move {
            ctx.sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        assert_eq!(task.start(false).await, StartOutcome::Started);
        assert_eq!(task.start(false).await, StartOutcome::AlreadyRunning);
        assert!(task.is_running());

        task.stop().await;
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn force_start_replaces_running_context() {
        let task = Task::from_fn("forced", |ctx| async move {
            ctx.sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        task.start(false).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.start(true).await, StartOutcome::Started);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(task.is_running());
        assert_eq!(task.execute_count(), 2);
        task.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_times_out_on_blocking_body() {
        let task = Task::from_fn("stubborn", |_ctx| async {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .with_stop_timeout(Duration::from_millis(50));

        task.start(false).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let begun = Instant::now();
        task.stop().await;
        assert!(begun.elapsed() < Duration::from_millis(250));
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn stop_clears_children() {
        let parent = Task::noop_with_id("parent");
        parent
            .add_child_task(Arc::new(Task::from_fn("child", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })))
            .await;

        assert_eq!(parent.count_child_task().await, 1);
        let child = parent.get_child_task("child").await.unwrap();
        assert_eq!(child.parent_id().as_deref(), Some("parent"));

        parent.stop().await;
        assert_eq!(parent.count_child_task().await, 0);
        assert!(!parent.is_running());
        assert!(!child.is_running());
        assert!(!child.is_alive().await);
    }

    #[tokio::test]
    async fn own_id_as_child_is_rejected() {
        let task = Task::noop_with_id("loop");
        task.add_child_task(Arc::new(Task::noop_with_id("loop"))).await;
        assert_eq!(task.count_child_task().await, 0);
    }

    #[tokio::test]
    async fn ancestor_as_child_is_rejected() {
        let a = Arc::new(Task::noop_with_id("a"));
        let b = Arc::new(Task::noop_with_id("b"));
        let c = Arc::new(Task::noop_with_id("c"));
        a.add_child_task(Arc::clone(&b)).await;
        b.add_child_task(Arc::clone(&c)).await;

        let added = tokio::time::timeout(Duration::from_secs(2), b.add_child_task(Arc::clone(&a)))
            .await;
        assert!(added.is_ok(), "adding a parent as a child must not hang");
        let added = tokio::time::timeout(Duration::from_secs(2), c.add_child_task(Arc::clone(&a)))
            .await;
        assert!(added.is_ok(), "adding a grandparent as a child must not hang");

        assert_eq!(b.child_ids().await, vec!["c".to_string()]);
        assert_eq!(c.count_child_task().await, 0);
        assert_eq!(a.count_child_task().await, 1);

        a.stop().await;
        assert_eq!(b.count_child_task().await, 0);
    }

    #[tokio::test]
    async fn with_config_rejects_zero_window() {
        let bad = TaskConfig {
            average_window: 0,
            ..TaskConfig::default()
        };
        assert!(Task::noop().with_config(bad).is_err());

        let good = TaskConfig {
            average_window: 3,
            stop_timeout: Duration::from_millis(100),
        };
        assert!(Task::noop().with_config(good).is_ok());
    }

    #[tokio::test]
    async fn statistics_track_run_duration() {
        let task = Task::from_fn("timed", |_ctx| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(())
        });

        task.start(false).await;
        wait_idle(&task).await;

        let stats = task.statistics().await;
        assert_eq!(stats.execute_count, 1);
        assert!(stats.run_duration_ms >= 25);
        assert!(stats.recent_average_ms >= 25.0);
        assert!(stats.start_time.is_some());
        assert_eq!(stats.success_rate(), 1.0);
    }
}
