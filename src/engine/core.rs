// src/engine/core.rs

//! Pure scheduler state machine.
//!
//! This module contains a synchronous, deterministic "core" that owns the
//! admission queue, the running set and the history, and turns every
//! operation into:
//! - an updated core state
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - receiving requests and executor reports from channels
//! - spawning executors
//! - publishing events and persisting history
//!
//! The core has no channels and does not perform any IO, so it can be
//! driven step by step in tests.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::engine::{ExecutionOutcome, SchedulerStats};
use crate::errors::{Result, TaskgateError};
use crate::events::TaskEvent;
use crate::task::{Checkpoint, Executor, Status, Task, TaskSnapshot};
use crate::types::TaskId;

/// Everything the shell needs to start one executor.
pub struct Launch {
    pub id: TaskId,
    pub name: String,
    pub executor: Executor,
    pub checkpoint: Checkpoint,
}

impl fmt::Debug for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launch")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Command produced by the core, to be executed by the outer IO shell.
#[derive(Debug)]
pub enum CoreCommand {
    /// Start this executor on its own task.
    Launch(Launch),
    /// Deliver this event to bus subscribers.
    Publish(TaskEvent),
    /// Hand the full history to the history store.
    PersistHistory(Vec<TaskSnapshot>),
}

/// Result of a single core operation.
#[derive(Debug, Default)]
pub struct CoreStep {
    /// Commands for the shell, in the order they must run.
    pub commands: Vec<CoreCommand>,
    /// Whether the request changed anything (`false` for stale ids and
    /// requests that do not apply to the task's current state).
    pub accepted: bool,
}

impl CoreStep {
    fn accepted() -> Self {
        Self {
            commands: Vec::new(),
            accepted: true,
        }
    }

    fn rejected() -> Self {
        Self::default()
    }

    fn publish(&mut self, event: TaskEvent) {
        self.commands.push(CoreCommand::Publish(event));
    }

    pub fn events(&self) -> impl Iterator<Item = &TaskEvent> {
        self.commands.iter().filter_map(|command| match command {
            CoreCommand::Publish(event) => Some(event),
            _ => None,
        })
    }

    /// Ids of the executors this step asks to start, in dispatch order.
    pub fn launched(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.commands.iter().filter_map(|command| match command {
            CoreCommand::Launch(launch) => Some(launch.id),
            _ => None,
        })
    }
}

/// Scheduler state: FIFO queue, bounded running set, append-only history.
///
/// Invariants:
/// - `running.len() <= max_concurrency`
/// - a task is in at most one of `queue` / `running`
/// - `history` only holds COMPLETED or FAILED tasks, appended at teardown
#[derive(Debug)]
pub struct SchedulerCore {
    max_concurrency: usize,
    queue: crate::engine::AdmissionQueue,
    running: Vec<Task>,
    history: Vec<Task>,
    /// Final snapshots of tasks that ended CANCELED in this session, for
    /// lookups only. One entry per id, since ids are never reused.
    canceled: HashMap<TaskId, TaskSnapshot>,
    /// Every id ever submitted or loaded from history.
    seen: HashSet<TaskId>,
}

impl SchedulerCore {
    pub fn new(max_concurrency: usize) -> Self {
        Self::with_history(max_concurrency, Vec::new())
    }

    /// Start from previously persisted history, so later saves extend it.
    ///
    /// `max_concurrency` is clamped to at least 1; a zero-slot scheduler
    /// would never dispatch anything.
    pub fn with_history(max_concurrency: usize, history: Vec<Task>) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let seen = history.iter().map(Task::id).collect();
        Self {
            max_concurrency,
            queue: crate::engine::AdmissionQueue::new(),
            running: Vec::new(),
            history,
            canceled: HashMap::new(),
            seen,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn slots_available(&self) -> usize {
        self.max_concurrency.saturating_sub(self.running.len())
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty()
    }

    pub fn running_ids(&self) -> Vec<TaskId> {
        self.running.iter().map(Task::id).collect()
    }

    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.queue.ids()
    }

    pub fn history(&self) -> &[Task] {
        &self.history
    }

    pub fn history_snapshots(&self) -> Vec<TaskSnapshot> {
        self.history.iter().map(Task::snapshot).collect()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            max_concurrency: self.max_concurrency,
            queued: self.queue.len(),
            running: self.running.len(),
            slots_available: self.slots_available(),
            history_len: self.history.len(),
        }
    }

    /// Look a task up wherever it currently lives.
    pub fn snapshot(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.queue
            .get(id)
            .or_else(|| self.running.iter().find(|t| t.id() == id))
            .or_else(|| self.history.iter().rev().find(|t| t.id() == id))
            .map(Task::snapshot)
            .or_else(|| self.canceled.get(&id).cloned())
    }

    /// Queue a freshly created task and dispatch as many tasks as slots allow.
    pub fn add_task(&mut self, mut task: Task) -> Result<CoreStep> {
        let id = task.id();
        let status = task.status();
        if status != Status::Created {
            return Err(TaskgateError::NotSchedulable { id, status });
        }
        if self.seen.contains(&id) {
            return Err(TaskgateError::DuplicateTask(id));
        }
        let Some(executor) = task.take_executor() else {
            return Err(TaskgateError::NotSchedulable { id, status });
        };
        self.seen.insert(id);

        task.transition(Status::Queued);

        let mut step = CoreStep::accepted();
        step.publish(TaskEvent::Queued {
            id,
            name: task.name().to_string(),
        });
        self.queue.push_back(task, executor);
        info!(task_id = id, queue_len = self.queue.len(), "task added to queue");

        self.run_next(&mut step);
        Ok(step)
    }

    /// Handle the end of a running task's executor.
    ///
    /// Reports for ids that are not running are ignored, which makes the
    /// teardown happen exactly once per dispatched task.
    pub fn finish(&mut self, id: TaskId, outcome: ExecutionOutcome) -> CoreStep {
        let Some(index) = self.running.iter().position(|t| t.id() == id) else {
            warn!(task_id = id, ?outcome, "report for task that is not running; ignoring");
            return CoreStep::rejected();
        };

        let task = self.running.remove(index);
        let mut step = CoreStep::accepted();
        self.settle(task, outcome, &mut step);
        self.run_next(&mut step);
        step
    }

    /// Pause a running task. Queued tasks can not be paused.
    pub fn pause(&mut self, id: TaskId) -> CoreStep {
        let Some(task) = self.running.iter_mut().find(|t| t.id() == id) else {
            debug!(task_id = id, "pause requested for task that is not running; ignoring");
            return CoreStep::rejected();
        };

        if task.status() != Status::Running || !task.control().pause() {
            debug!(task_id = id, status = %task.status(), "pause does not apply; ignoring");
            return CoreStep::rejected();
        }

        task.transition(Status::Paused);
        info!(task_id = id, "task paused");

        let mut step = CoreStep::accepted();
        step.publish(TaskEvent::Paused(id));
        step
    }

    /// Resume a paused running task, releasing its parked checkpoint.
    pub fn resume(&mut self, id: TaskId) -> CoreStep {
        let Some(task) = self.running.iter_mut().find(|t| t.id() == id) else {
            debug!(task_id = id, "resume requested for task that is not running; ignoring");
            return CoreStep::rejected();
        };

        if !task.control().resume() {
            debug!(task_id = id, status = %task.status(), "task is not paused; ignoring resume");
            return CoreStep::rejected();
        }

        task.transition(Status::Running);
        info!(task_id = id, "task resumed");

        let mut step = CoreStep::accepted();
        step.publish(TaskEvent::Resumed(id));
        step
    }

    /// Cancel a running or queued task.
    ///
    /// A queued task is removed and never starts. A running task is marked
    /// CANCELED at once but keeps its slot until its executor reaches a
    /// checkpoint (or ends on its own).
    pub fn cancel(&mut self, id: TaskId) -> CoreStep {
        let mut step = CoreStep::rejected();
        let accepted = self.cancel_into(id, &mut step);
        step.accepted = accepted;
        step
    }

    /// Cancel every queued and running task.
    pub fn shutdown(&mut self) -> CoreStep {
        let mut step = CoreStep::accepted();
        let ids: Vec<TaskId> = self
            .running
            .iter()
            .map(Task::id)
            .chain(self.queue.ids())
            .collect();

        info!(tasks = ids.len(), "shutting down scheduler; cancelling outstanding tasks");
        for id in ids {
            self.cancel_into(id, &mut step);
        }
        step
    }

    fn cancel_into(&mut self, id: TaskId, step: &mut CoreStep) -> bool {
        if let Some(task) = self.running.iter_mut().find(|t| t.id() == id) {
            if task.status().is_terminal() {
                debug!(task_id = id, "task already cancelled; ignoring");
                return false;
            }
            task.control().cancel();
            task.transition(Status::Canceled);
            info!(task_id = id, "cancel requested; takes effect at the next checkpoint");
            step.publish(TaskEvent::Canceled(id));
            return true;
        }

        if let Some(mut task) = self.queue.remove(id) {
            task.control().cancel();
            task.transition(Status::Canceled);
            task.mark_completed();
            task.release();
            info!(task_id = id, "queued task cancelled before start");
            step.publish(TaskEvent::Canceled(id));
            self.canceled.insert(id, task.snapshot());
            return true;
        }

        debug!(task_id = id, "cancel requested for unknown task; ignoring");
        false
    }

    /// Admission gate: move tasks from the head of the queue into free slots.
    fn run_next(&mut self, step: &mut CoreStep) {
        while self.running.len() < self.max_concurrency {
            let Some((mut task, executor)) = self.queue.pop_front() else {
                break;
            };

            let id = task.id();
            task.transition(Status::Running);
            task.mark_started();

            step.publish(TaskEvent::Started {
                id,
                status: task.status(),
            });
            step.commands.push(CoreCommand::Launch(Launch {
                id,
                name: task.name().to_string(),
                executor,
                checkpoint: task.checkpoint(),
            }));

            self.running.push(task);
            info!(
                task_id = id,
                running = self.running.len(),
                max_concurrency = self.max_concurrency,
                "task dispatched"
            );
        }
    }

    /// Terminal bookkeeping for a task that has left `running`.
    fn settle(&mut self, mut task: Task, outcome: ExecutionOutcome, step: &mut CoreStep) {
        let id = task.id();

        match outcome {
            ExecutionOutcome::Success => {
                if task.transition(Status::Completed) {
                    info!(task_id = id, "task completed");
                    step.publish(TaskEvent::Completed(id));
                }
            }
            ExecutionOutcome::Failed(message) => {
                if task.transition(Status::Failed) {
                    warn!(task_id = id, error = %message, "task failed");
                    task.record_error(message.clone());
                    step.publish(TaskEvent::Failed { id, error: message });
                }
            }
            ExecutionOutcome::Cancelled => {
                if !task.status().is_terminal() {
                    task.transition(Status::Canceled);
                    step.publish(TaskEvent::Canceled(id));
                }
                info!(task_id = id, "task unwound after cancellation");
            }
        }

        task.mark_completed();
        task.release();

        let status = task.status();
        let slots_available = self.slots_available();
        info!(task_id = id, %status, slots_available, "task finished");
        step.publish(TaskEvent::Finished {
            id,
            slots_available,
            status,
        });

        if matches!(status, Status::Completed | Status::Failed) {
            self.history.push(task);
        } else {
            self.canceled.insert(id, task.snapshot());
        }
        step.commands
            .push(CoreCommand::PersistHistory(self.history_snapshots()));
    }
}
