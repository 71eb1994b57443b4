// src/engine/queue.rs

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::task::{Executor, Task};
use crate::types::TaskId;

/// A queued task together with the executor taken from it at admission.
struct Admitted {
    task: Task,
    executor: Executor,
}

/// Tasks waiting for a slot, in arrival order.
///
/// Semantics:
/// - `push_back` appends at the tail; `pop_front` always yields the
///   earliest-queued task (strict FIFO, no priorities).
/// - `remove` takes a task out from anywhere in the queue (cancel before
///   start) without disturbing the relative order of the rest.
/// - every entry carries its executor, so a dequeued task can always be
///   launched.
/// - the queue is unbounded.
#[derive(Default)]
pub struct AdmissionQueue {
    entries: VecDeque<Admitted>,
}

impl fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("ids", &self.ids())
            .finish()
    }
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_back(&mut self, task: Task, executor: Executor) {
        debug!(task_id = task.id(), position = self.entries.len(), "task appended to queue");
        self.entries.push_back(Admitted { task, executor });
    }

    pub fn pop_front(&mut self) -> Option<(Task, Executor)> {
        self.entries
            .pop_front()
            .map(|entry| (entry.task, entry.executor))
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.entries
            .iter()
            .map(|entry| &entry.task)
            .find(|task| task.id() == id)
    }

    /// Remove the task with `id`, if queued. Its executor is dropped unrun.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let index = self.entries.iter().position(|entry| entry.task.id() == id)?;
        self.entries.remove(index).map(|entry| entry.task)
    }

    /// Ids in dispatch order.
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|entry| entry.task.id()).collect()
    }
}
