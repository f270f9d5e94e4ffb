//! Task bodies: the `TaskHandler` trait and the closure-backed `FnTask`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Context handed to a running task body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// ID of the task being executed.
    pub task_id: String,
    /// ID of the owning parent task, if this task is a child.
    pub parent_id: Option<String>,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            task_id: task_id.into(),
            parent_id: None,
            cancel,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Whether `stop()` has been requested for this execution.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Sleep for `duration`. Returns `false` if cancelled first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Behaviour of a task: precondition, body and optional hooks.
///
/// `before_run`, `run` and `after_run` execute sequentially on the same
/// execution context. `after_run` only runs when the first two succeed.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Stable ID override. A fresh UUID is assigned when `None`.
    fn id(&self) -> Option<String> {
        None
    }

    /// Precondition checked by `Task::start`. Must be side-effect free.
    fn check(&self) -> bool;

    /// The task body.
    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()>;

    async fn before_run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
        Ok(())
    }
}

type BoxedBody = Arc<dyn Fn(TaskContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Task handler built from an optional ID and a closure. `check()` is always true.
#[derive(Clone)]
pub struct FnTask {
    id: Option<String>,
    body: Option<BoxedBody>,
}

impl FnTask {
    /// Handler whose body does nothing.
    pub fn noop(id: Option<String>) -> Self {
        Self { id, body: None }
    }

    pub fn new<F, Fut>(id: Option<String>, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let body: BoxedBody = Arc::new(move |ctx: TaskContext| {
            Box::pin(body(ctx)) as BoxFuture<'static, anyhow::Result<()>>
        });
        Self {
            id,
            body: Some(body),
        }
    }
}

impl std::fmt::Debug for FnTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("id", &self.id)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[async_trait]
impl TaskHandler for FnTask {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn check(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        match &self.body {
            Some(body) => body(ctx.clone()).await,
            None => Ok(()),
        }
    }
}
