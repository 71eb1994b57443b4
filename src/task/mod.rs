// src/task/mod.rs

//! Tasks: one unit of asynchronous work plus its lifecycle state.
//!
//! - [`status`] holds the `Status` enum and its parsing rules.
//! - [`control`] holds the pause/cancel control block and the `Checkpoint`
//!   executors call to cooperate with it.
//! - [`snapshot`] holds the serialisable projection used for history.

pub mod control;
pub mod snapshot;
pub mod status;

pub use control::{Cancelled, Checkpoint, ControlFlags, TaskControl};
pub use snapshot::TaskSnapshot;
pub use status::Status;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{now_millis, TaskId};

/// Future returned by an executor.
pub type ExecutorFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// The unit of work a task wraps. It receives the task's checkpoint and is
/// consumed when the task is dispatched.
pub type Executor = Box<dyn FnOnce(Checkpoint) -> ExecutorFuture + Send + 'static>;

/// A schedulable unit of work.
///
/// Created in [`Status::Created`] by the caller, then owned and mutated by
/// the scheduler until it reaches a terminal state.
pub struct Task {
    id: TaskId,
    name: String,
    executor: Option<Executor>,
    status: Status,
    created_at: u64,
    started_at: Option<u64>,
    completed_at: Option<u64>,
    error: Option<String>,
    control: TaskControl,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("has_executor", &self.executor.is_some())
            .field("control", &self.control.flags())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Create a new task around an async executor.
    ///
    /// ```ignore
    /// let task = Task::new(1, "download", |checkpoint| async move {
    ///     for _ in 0..10 {
    ///         checkpoint.check_signal().await?;
    ///         fetch_next_chunk().await?;
    ///     }
    ///     Ok(())
    /// });
    /// ```
    pub fn new<F, Fut>(id: TaskId, name: impl Into<String>, executor: F) -> Self
    where
        F: FnOnce(Checkpoint) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let executor: Executor =
            Box::new(move |checkpoint: Checkpoint| -> ExecutorFuture { Box::pin(executor(checkpoint)) });
        Self::with_parts(id, name.into(), Some(executor))
    }

    fn with_parts(id: TaskId, name: String, executor: Option<Executor>) -> Self {
        Self {
            id,
            name,
            executor,
            status: Status::Created,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
            error: None,
            control: TaskControl::new(),
        }
    }

    /// Rebuild a historical task from its persisted projection.
    ///
    /// The control block is always fresh and there is no executor, so the
    /// result can be inspected but never scheduled.
    pub fn from_snapshot(snapshot: TaskSnapshot) -> Self {
        let mut task = Self::with_parts(snapshot.id, snapshot.name, None);
        task.status = snapshot.status;
        task.created_at = snapshot.created_at;
        task.started_at = snapshot.started_at;
        task.completed_at = snapshot.completed_at;
        task.error = snapshot.error;
        task
    }

    /// Parse one persisted task from JSON. See [`Task::from_snapshot`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: TaskSnapshot = serde_json::from_str(raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn control(&self) -> &TaskControl {
        &self.control
    }

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    /// A checkpoint bound to this task's control block.
    pub fn checkpoint(&self) -> Checkpoint {
        self.control.checkpoint(self.id)
    }

    /// Move the task to `next`.
    ///
    /// Returns `false` (and logs a warning) without changing anything when
    /// the task is already terminal.
    pub fn transition(&mut self, next: Status) -> bool {
        if self.status.is_terminal() {
            warn!(
                task_id = self.id,
                status = %self.status,
                target = %next,
                "task is already finished; ignoring transition"
            );
            return false;
        }

        debug!(task_id = self.id, from = %self.status, to = %next, "task transition");
        self.status = next;
        true
    }

    /// Like [`Task::transition`], but with the target given by name.
    ///
    /// Unknown names fail with `InvalidTransition` before the terminal check.
    pub fn transition_named(&mut self, target: &str) -> Result<bool> {
        let next = target.parse::<Status>()?;
        Ok(self.transition(next))
    }

    pub(crate) fn take_executor(&mut self) -> Option<Executor> {
        self.executor.take()
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(now_millis());
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed_at = Some(now_millis());
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Drop the executor and swap in a fresh control block, releasing any
    /// continuation still parked on the old one.
    pub fn release(&mut self) {
        self.executor = None;
        self.control = TaskControl::new();
        debug!(task_id = self.id, "task references released");
    }
}
