// src/engine/scheduler.rs

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::errors::{Result, TaskgateError};
use crate::events::EventBus;
use crate::history::HistoryStore;
use crate::task::{Status, Task, TaskSnapshot};
use crate::types::TaskId;

use super::core::SchedulerCore;
use super::runtime::Runtime;
use super::{SchedulerCommand, SchedulerStats};

/// Cloneable handle to a running scheduler loop.
///
/// Every method is a request to the loop; it fails with `SchedulerClosed`
/// only when the loop has stopped. Requests that name an unknown or stale
/// id are not errors: they return `false`.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl Scheduler {
    pub(crate) fn from_sender(tx: mpsc::Sender<SchedulerCommand>) -> Self {
        Self { tx }
    }

    /// Create an empty scheduler and spawn its loop on the current Tokio
    /// runtime.
    pub fn start(
        max_concurrency: usize,
        bus: EventBus,
        store: Arc<dyn HistoryStore>,
    ) -> (Self, JoinHandle<Result<()>>) {
        Self::start_with_core(SchedulerCore::new(max_concurrency), bus, store)
    }

    /// Like [`Scheduler::start`], with a prepared core (e.g. seeded history).
    pub fn start_with_core(
        core: SchedulerCore,
        bus: EventBus,
        store: Arc<dyn HistoryStore>,
    ) -> (Self, JoinHandle<Result<()>>) {
        let (runtime, scheduler) = Runtime::new(core, bus, store);
        let handle = tokio::spawn(runtime.run());
        (scheduler, handle)
    }

    /// Queue a task created with [`Task::new`]. Returns once the task is
    /// queued (and dispatched, if a slot was free); never waits for the
    /// executor.
    pub async fn add_task(&self, task: Task) -> Result<()> {
        self.request(|reply| SchedulerCommand::AddTask { task, reply })
            .await?
    }

    /// Pause a running task at its next checkpoint.
    pub async fn pause_task(&self, id: TaskId) -> Result<bool> {
        self.request(|reply| SchedulerCommand::Pause { id, reply })
            .await
    }

    /// Resume a paused task.
    pub async fn resume_task(&self, id: TaskId) -> Result<bool> {
        self.request(|reply| SchedulerCommand::Resume { id, reply })
            .await
    }

    /// Cancel a queued or running task.
    pub async fn cancel_task(&self, id: TaskId) -> Result<bool> {
        self.request(|reply| SchedulerCommand::Cancel { id, reply })
            .await
    }

    pub async fn snapshot(&self, id: TaskId) -> Result<Option<TaskSnapshot>> {
        self.request(|reply| SchedulerCommand::Snapshot { id, reply })
            .await
    }

    pub async fn status_of(&self, id: TaskId) -> Result<Option<Status>> {
        Ok(self.snapshot(id).await?.map(|snapshot| snapshot.status))
    }

    pub async fn stats(&self) -> Result<SchedulerStats> {
        self.request(|reply| SchedulerCommand::Stats { reply }).await
    }

    /// Finished tasks (COMPLETED / FAILED) in completion order.
    pub async fn history(&self) -> Result<Vec<TaskSnapshot>> {
        self.request(|reply| SchedulerCommand::History { reply })
            .await
    }

    /// Resolve once nothing is queued or running.
    pub async fn wait_idle(&self) -> Result<()> {
        self.request(|reply| SchedulerCommand::WaitIdle { reply })
            .await
    }

    /// Cancel every outstanding task and stop the loop.
    ///
    /// Returns once the request is delivered; the loop itself exits after
    /// the running tasks are torn down (see [`super::SHUTDOWN_GRACE`]).
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(SchedulerCommand::Shutdown)
            .await
            .map_err(|_| TaskgateError::SchedulerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| TaskgateError::SchedulerClosed)?;
        rx.await.map_err(|_| TaskgateError::SchedulerClosed)
    }
}
