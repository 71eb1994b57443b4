// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::events::EventBus;
use crate::exec::spawn_executor;
use crate::history::HistoryStore;
use crate::types::TaskId;

use super::core::{CoreCommand, CoreStep, SchedulerCore};
use super::scheduler::Scheduler;
use super::{ExecutorReport, SchedulerCommand};

const CHANNEL_CAPACITY: usize = 64;

/// How long shutdown waits for cancelled executors to reach a checkpoint
/// before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Drives the scheduler core in response to requests and executor reports,
/// and carries out the commands the core returns.
///
/// This is the only place the core is mutated, so every queue / running /
/// history change is serialised through this one loop.
pub struct Runtime {
    core: SchedulerCore,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    report_tx: mpsc::Sender<ExecutorReport>,
    report_rx: mpsc::Receiver<ExecutorReport>,
    bus: EventBus,
    store: Arc<dyn HistoryStore>,
    idle_waiters: Vec<oneshot::Sender<()>>,
    /// Abort handles of the executors currently in `core`'s running set.
    executors: HashMap<TaskId, AbortHandle>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("store", &self.store)
            .field("executors", &self.executors.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Build the runtime around `core` and return it together with the
    /// first [`Scheduler`] handle. Nothing happens until [`Runtime::run`]
    /// is polled.
    pub fn new(
        core: SchedulerCore,
        bus: EventBus,
        store: Arc<dyn HistoryStore>,
    ) -> (Self, Scheduler) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (report_tx, report_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let runtime = Self {
            core,
            command_rx,
            report_tx,
            report_rx,
            bus,
            store,
            idle_waiters: Vec::new(),
            executors: HashMap::new(),
        };
        (runtime, Scheduler::from_sender(command_tx))
    }

    /// Main loop.
    ///
    /// - Consumes `SchedulerCommand`s from handles and `ExecutorReport`s from
    ///   executor drivers.
    /// - Feeds them into the core and executes the returned commands.
    /// - On shutdown (explicit, or every handle dropped) stops taking
    ///   requests, cancels all outstanding tasks and waits for every running
    ///   executor to be torn down before returning. Executors still running
    ///   after [`SHUTDOWN_GRACE`] are aborted.
    pub async fn run(mut self) -> Result<()> {
        info!(
            max_concurrency = self.core.max_concurrency(),
            "taskgate scheduler started"
        );

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SchedulerCommand::Shutdown) => {
                        info!("shutdown requested; stopping scheduler");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("all scheduler handles dropped; stopping scheduler");
                        break;
                    }
                },
                Some(report) = self.report_rx.recv() => self.handle_report(report),
            }

            self.notify_if_idle();
        }

        self.command_rx.close();
        while let Ok(command) = self.command_rx.try_recv() {
            debug!(?command, "dropping request received after shutdown");
        }
        let step = self.core.shutdown();
        self.apply(step);
        self.drain_running().await;
        self.notify_if_idle();

        info!(
            running = self.core.running_count(),
            history = self.core.history().len(),
            "scheduler loop exiting"
        );
        Ok(())
    }

    fn handle_report(&mut self, report: ExecutorReport) {
        debug!(task_id = report.id, outcome = ?report.outcome, "executor report received");
        self.executors.remove(&report.id);
        let step = self.core.finish(report.id, report.outcome);
        self.apply(step);
    }

    /// Wait until every running task has been torn down through
    /// [`SchedulerCore::finish`], aborting the executors that outlive the
    /// grace period.
    async fn drain_running(&mut self) {
        if self.core.running_count() == 0 {
            return;
        }
        info!(
            running = self.core.running_count(),
            grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
            "waiting for running executors to unwind"
        );

        let deadline = sleep(SHUTDOWN_GRACE);
        tokio::pin!(deadline);
        let mut aborted = false;

        while self.core.running_count() > 0 {
            tokio::select! {
                Some(report) = self.report_rx.recv() => self.handle_report(report),
                () = &mut deadline, if !aborted => {
                    warn!(
                        running = ?self.core.running_ids(),
                        "executors ignored cancellation; aborting them"
                    );
                    for (_, handle) in self.executors.drain() {
                        handle.abort();
                    }
                    aborted = true;
                }
                else => break,
            }
        }
    }

    fn handle_command(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::AddTask { task, reply } => {
                let result = match self.core.add_task(task) {
                    Ok(step) => {
                        self.apply(step);
                        Ok(())
                    }
                    Err(err) => {
                        warn!(error = %err, "task rejected");
                        Err(err)
                    }
                };
                let _ = reply.send(result);
            }
            SchedulerCommand::Pause { id, reply } => {
                let step = self.core.pause(id);
                let _ = reply.send(self.apply(step));
            }
            SchedulerCommand::Resume { id, reply } => {
                let step = self.core.resume(id);
                let _ = reply.send(self.apply(step));
            }
            SchedulerCommand::Cancel { id, reply } => {
                let step = self.core.cancel(id);
                let _ = reply.send(self.apply(step));
            }
            SchedulerCommand::Snapshot { id, reply } => {
                let _ = reply.send(self.core.snapshot(id));
            }
            SchedulerCommand::Stats { reply } => {
                let _ = reply.send(self.core.stats());
            }
            SchedulerCommand::History { reply } => {
                let _ = reply.send(self.core.history_snapshots());
            }
            SchedulerCommand::WaitIdle { reply } => {
                self.idle_waiters.push(reply);
            }
            SchedulerCommand::Shutdown => {
                // Handled by the main loop before dispatching here.
            }
        }
    }

    /// Execute a step's commands in order. Returns whether the step was
    /// accepted by the core.
    fn apply(&mut self, step: CoreStep) -> bool {
        for command in step.commands {
            match command {
                CoreCommand::Launch(launch) => {
                    let id = launch.id;
                    let handle = spawn_executor(launch, self.report_tx.clone());
                    self.executors.insert(id, handle);
                }
                CoreCommand::Publish(event) => {
                    self.bus.publish(&event);
                }
                CoreCommand::PersistHistory(snapshots) => {
                    if let Err(err) = self.store.save_history(&snapshots) {
                        warn!(error = %err, entries = snapshots.len(), "failed to persist history");
                    }
                }
            }
        }
        step.accepted
    }

    fn notify_if_idle(&mut self) {
        if !self.core.is_idle() || self.idle_waiters.is_empty() {
            return;
        }
        debug!(waiters = self.idle_waiters.len(), "scheduler idle");
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
