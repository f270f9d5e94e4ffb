//! Task executor: pool-backed async work submission.
//!
//! Provides:
//! - `submit()`: fire-and-forget work, failures logged and swallowed
//! - `submit_async()`: work with a result, failures surfaced on the handle
//! - `schedule()`: one-shot delayed work
//! - `schedule_at_fixed_rate()`: periodic work until cancelled
//! - `shutdown()` / `shutdown_now()`: graceful and forced teardown
//!
//! Elastic executors spawn without limit. Bounded executors cap concurrent
//! work with a semaphore and admit at most `queue_capacity` items at once;
//! the admission queue can be shared between executors.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;

use crate::config::ExecutorConfig;
use crate::error::{ConfigError, ExecutorError, panic_message};
use crate::logging;

const TAG: &str = "TaskExecutor";

/// Admission slots shared by one or more executors.
#[derive(Debug)]
pub struct WorkQueue {
    capacity: usize,
    slots: Arc<Semaphore>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free admission slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }
}

/// Cancellation handle for periodic work.
#[derive(Debug, Clone, Default)]
pub struct CancellableTask {
    token: CancellationToken,
}

impl CancellableTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

enum HandleState<T> {
    Spawned(JoinHandle<Result<T, ExecutorError>>),
    Failed(ExecutorError),
}

/// Handle to submitted work.
pub struct WorkHandle<T> {
    state: HandleState<T>,
    cancel: CancellationToken,
}

impl<T> WorkHandle<T> {
    fn failed(err: ExecutorError) -> Self {
        Self {
            state: HandleState::Failed(err),
            cancel: CancellationToken::new(),
        }
    }

    /// Request cancellation. Takes effect at the work's next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Spawned(handle) => handle.is_finished(),
            HandleState::Failed(_) => true,
        }
    }

    /// Wait for the work and return its result.
    pub async fn join(self) -> Result<T, ExecutorError> {
        match self.state {
            HandleState::Failed(err) => Err(err),
            HandleState::Spawned(handle) => match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(ExecutorError::Cancelled),
                Err(e) => Err(ExecutorError::Panicked {
                    reason: panic_message(e.into_panic().as_ref()),
                }),
            },
        }
    }
}

impl<T> std::fmt::Debug for WorkHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkHandle")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Generic executor for asynchronous work.
///
/// All submission methods must be called from within a tokio runtime.
pub struct TaskExecutor {
    name: String,
    workers: Option<Arc<Semaphore>>,
    queue: Option<Arc<WorkQueue>>,
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
    accepting: AtomicBool,
    shutdown_grace: Duration,
}

impl TaskExecutor {
    /// Elastic executor: every submission is spawned immediately.
    pub fn new() -> Self {
        Self::build(ExecutorConfig::default(), None)
    }

    /// Executor sized by `config`, with its own admission queue.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = config.queue_capacity.map(WorkQueue::new);
        Ok(Self::build(config, queue))
    }

    /// Executor sized by `config` that admits work through a shared queue.
    pub fn with_shared_queue(
        config: ExecutorConfig,
        queue: Arc<WorkQueue>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Some(queue)))
    }

    fn build(config: ExecutorConfig, queue: Option<Arc<WorkQueue>>) -> Self {
        Self {
            name: config.name,
            workers: config.max_workers.map(|n| Arc::new(Semaphore::new(n))),
            queue,
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
            accepting: AtomicBool::new(true),
            shutdown_grace: config.shutdown_grace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shutdown(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Number of work items admitted and not yet finished.
    pub fn active_count(&self) -> usize {
        self.tracker.len()
    }

    fn admit(&self) -> Result<Option<OwnedSemaphorePermit>, ExecutorError> {
        if self.is_shutdown() {
            return Err(ExecutorError::ShutDown {
                name: self.name.clone(),
            });
        }
        match &self.queue {
            Some(queue) => queue
                .try_admit()
                .map(Some)
                .ok_or_else(|| ExecutorError::Rejected {
                    name: self.name.clone(),
                    capacity: queue.capacity(),
                }),
            None => Ok(None),
        }
    }

    fn spawn_tracked<T, Fut>(&self, work: Fut) -> Result<WorkHandle<T>, ExecutorError>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ExecutorError>> + Send + 'static,
    {
        let admission = self.admit()?;
        let workers = self.workers.clone();
        let shutdown = self.shutdown_token.clone();
        let cancel = CancellationToken::new();
        let item_cancel = cancel.clone();

        let handle = self.tracker.spawn(async move {
            let _admission = admission;

            let _permit = match workers {
                Some(workers) => tokio::select! {
                    permit = workers.acquire_owned() => permit.ok(),
                    _ = shutdown.cancelled() => return Err(ExecutorError::Cancelled),
                    _ = item_cancel.cancelled() => return Err(ExecutorError::Cancelled),
                },
                None => None,
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    logging::runtime(TAG, "Work cancelled by executor shutdown");
                    Err(ExecutorError::Cancelled)
                }
                _ = item_cancel.cancelled() => {
                    logging::runtime(TAG, "Work cancelled");
                    Err(ExecutorError::Cancelled)
                }
                result = work => result,
            }
        });

        Ok(WorkHandle {
            state: HandleState::Spawned(handle),
            cancel,
        })
    }

    /// Run `work` in the background. Failures are logged, never propagated.
    pub fn submit<Fut>(&self, work: Fut) -> WorkHandle<()>
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let wrapped = async move {
            run_logged(work, "Submitted work").await;
            Ok(())
        };

        self.spawn_tracked(wrapped).unwrap_or_else(|e| {
            logging::error(TAG, &format!("Failed to submit work: {e}"));
            WorkHandle::failed(e)
        })
    }

    /// Run `work` and deliver its result on the returned handle.
    ///
    /// A failing `work` is logged and surfaces as `ExecutorError::Failed`.
    pub fn submit_async<T, Fut>(&self, work: Fut) -> WorkHandle<T>
    where
        T: Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let wrapped = async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    logging::print_error(TAG, "Async work failed", &e);
                    Err(ExecutorError::Failed {
                        reason: format!("{e:#}"),
                    })
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    logging::error(TAG, &format!("Async work panicked: {reason}"));
                    Err(ExecutorError::Panicked { reason })
                }
            }
        };

        self.spawn_tracked(wrapped).unwrap_or_else(|e| {
            logging::error(TAG, &format!("Failed to submit async work: {e}"));
            WorkHandle::failed(e)
        })
    }

    /// Run `work` once after `delay`. Cancelling the handle before it fires prevents it.
    pub fn schedule<Fut>(&self, work: Fut, delay: Duration) -> WorkHandle<()>
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let delayed = async move {
            tokio::time::sleep(delay).await;
            run_logged(work, "Scheduled work").await;
            Ok(())
        };

        self.spawn_tracked(delayed).unwrap_or_else(|e| {
            logging::error(TAG, &format!("Failed to schedule work: {e}"));
            WorkHandle::failed(e)
        })
    }

    /// Run `work` after `initial_delay`, then every `period`, until the returned handle is cancelled.
    ///
    /// Cancellation is checked before each run, so an in-progress run always
    /// completes. A failing run is logged and the schedule continues.
    pub fn schedule_at_fixed_rate<F, Fut>(
        &self,
        mut work: F,
        initial_delay: Duration,
        period: Duration,
    ) -> CancellableTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = CancellableTask::new();
        let token = task.clone();
        let period = period.max(Duration::from_millis(1));

        let periodic = async move {
            tokio::select! {
                _ = token.cancelled() => {
                    logging::runtime(TAG, "Periodic work cancelled before first run");
                    return Ok(());
                }
                _ = tokio::time::sleep(initial_delay) => {}
            }

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if token.is_cancelled() {
                    break;
                }
                run_logged(work(), "Periodic work").await;
            }

            logging::runtime(TAG, "Periodic work cancelled");
            Ok(())
        };

        if let Err(e) = self.spawn_tracked(periodic) {
            logging::error(TAG, &format!("Failed to schedule periodic work: {e}"));
            task.cancel();
        }
        task
    }

    /// Stop accepting work, wait up to the grace period, then cancel stragglers.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();

        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            logging::runtime(
                TAG,
                &format!(
                    "Executor {} still busy after {:?}, cancelling {} item(s)",
                    self.name,
                    self.shutdown_grace,
                    self.tracker.len()
                ),
            );
            self.shutdown_token.cancel();
        }
        logging::runtime(TAG, &format!("Executor {} shut down", self.name));
    }

    /// Stop accepting work and cancel everything in flight.
    pub fn shutdown_now(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();
        self.shutdown_token.cancel();
        logging::runtime(TAG, &format!("Executor {} shut down immediately", self.name));
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_logged<Fut>(work: Fut, what: &str)
where
    Fut: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => logging::print_error(TAG, &format!("{what} failed"), &e),
        Err(payload) => logging::error(
            TAG,
            &format!("{what} panicked: {}", panic_message(payload.as_ref())),
        ),
    }
}
