// src/events/mod.rs

//! Lifecycle notifications published by the scheduler.
//!
//! The set of events is closed: every notification is one [`TaskEvent`]
//! variant with its own payload, and subscribers register per
//! [`EventKind`] on the [`EventBus`].

pub mod bus;

pub use bus::{EventBus, Handler, SubscriptionId};

use std::fmt;

use crate::task::Status;
use crate::types::TaskId;

/// Discriminant of a [`TaskEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Queued,
    Started,
    Completed,
    Failed,
    Finished,
    Paused,
    Resumed,
    Canceled,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Queued,
        EventKind::Started,
        EventKind::Completed,
        EventKind::Failed,
        EventKind::Finished,
        EventKind::Paused,
        EventKind::Resumed,
        EventKind::Canceled,
    ];

    /// Wire name, e.g. `task:queued`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Queued => "task:queued",
            EventKind::Started => "task:started",
            EventKind::Completed => "task:completed",
            EventKind::Failed => "task:failed",
            EventKind::Finished => "task:finished",
            EventKind::Paused => "task:paused",
            EventKind::Resumed => "task:resumed",
            EventKind::Canceled => "task:canceled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle notification and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Queued { id: TaskId, name: String },
    Started { id: TaskId, status: Status },
    Completed(TaskId),
    Failed { id: TaskId, error: String },
    /// Teardown finished; `slots_available` counts free slots afterwards.
    Finished {
        id: TaskId,
        slots_available: usize,
        status: Status,
    },
    Paused(TaskId),
    Resumed(TaskId),
    Canceled(TaskId),
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TaskEvent::Queued { .. } => EventKind::Queued,
            TaskEvent::Started { .. } => EventKind::Started,
            TaskEvent::Completed(_) => EventKind::Completed,
            TaskEvent::Failed { .. } => EventKind::Failed,
            TaskEvent::Finished { .. } => EventKind::Finished,
            TaskEvent::Paused(_) => EventKind::Paused,
            TaskEvent::Resumed(_) => EventKind::Resumed,
            TaskEvent::Canceled(_) => EventKind::Canceled,
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Queued { id, .. }
            | TaskEvent::Started { id, .. }
            | TaskEvent::Failed { id, .. }
            | TaskEvent::Finished { id, .. } => *id,
            TaskEvent::Completed(id)
            | TaskEvent::Paused(id)
            | TaskEvent::Resumed(id)
            | TaskEvent::Canceled(id) => *id,
        }
    }
}
