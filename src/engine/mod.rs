// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the FIFO admission queue and the bounded running set
//! - the main loop that reacts to:
//!   - submissions and pause / resume / cancel requests
//!   - executor completion reports
//!   - shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; [`scheduler`] is the cloneable handle callers
//! use to talk to the shell.

use tokio::sync::oneshot;

use crate::errors::Result;
use crate::task::{Task, TaskSnapshot};
use crate::types::TaskId;

/// How an executor ended, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    /// The executor returned an error or panicked.
    Failed(String),
    /// The executor unwound from a checkpoint after a cancel request.
    Cancelled,
}

/// Report sent by an executor driver once its executor has ended.
#[derive(Debug)]
pub struct ExecutorReport {
    pub id: TaskId,
    pub outcome: ExecutionOutcome,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub max_concurrency: usize,
    pub queued: usize,
    pub running: usize,
    pub slots_available: usize,
    pub history_len: usize,
}

/// Requests flowing into the runtime loop from [`Scheduler`] handles.
#[derive(Debug)]
pub enum SchedulerCommand {
    AddTask {
        task: Task,
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Resume {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Cancel {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        id: TaskId,
        reply: oneshot::Sender<Option<TaskSnapshot>>,
    },
    Stats {
        reply: oneshot::Sender<SchedulerStats>,
    },
    History {
        reply: oneshot::Sender<Vec<TaskSnapshot>>,
    },
    WaitIdle {
        reply: oneshot::Sender<()>,
    },
    /// Cancel everything and stop the loop.
    Shutdown,
}

pub mod core;
pub mod queue;
pub mod runtime;
pub mod scheduler;

pub use self::core::{CoreCommand, CoreStep, Launch, SchedulerCore};
pub use queue::AdmissionQueue;
pub use runtime::{Runtime, SHUTDOWN_GRACE};
pub use scheduler::Scheduler;
