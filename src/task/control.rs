// src/task/control.rs

//! Cooperative pause / cancel control for a running executor.
//!
//! The scheduler side holds a [`TaskControl`]; the executor holds a
//! [`Checkpoint`] built from it. Both share one `watch` channel carrying the
//! current [`ControlFlags`]:
//!
//! - pausing sets `is_paused`; the next `check_signal()` parks on the channel
//!   until the flag is cleared (resume) or `is_cancelled` is set (cancel).
//! - cancelling sets `is_cancelled`; the next `check_signal()` returns
//!   [`Cancelled`], which the executor propagates with `?`.
//!
//! An executor that never calls `check_signal()` cannot be paused or
//! cancelled; it simply runs to completion.

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::types::TaskId;

/// Current control state of one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlFlags {
    pub is_paused: bool,
    pub is_cancelled: bool,
}

/// Signal returned from [`Checkpoint::check_signal`] once a task has been
/// cancelled. Executors propagate it; the scheduler recognises it anywhere
/// in an `anyhow` error chain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("task {id} has been cancelled")]
pub struct Cancelled {
    pub id: TaskId,
}

/// Scheduler-side control block.
#[derive(Debug)]
pub struct TaskControl {
    tx: watch::Sender<ControlFlags>,
}

impl TaskControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlFlags::default());
        Self { tx }
    }

    pub fn flags(&self) -> ControlFlags {
        *self.tx.borrow()
    }

    /// Hand out a checkpoint bound to this control block.
    pub fn checkpoint(&self, id: TaskId) -> Checkpoint {
        Checkpoint {
            id,
            rx: self.tx.subscribe(),
        }
    }

    /// Set the pause flag. Returns `false` if already paused or cancelled.
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|flags| {
            if flags.is_paused || flags.is_cancelled {
                return false;
            }
            flags.is_paused = true;
            true
        })
    }

    /// Clear the pause flag, releasing a parked checkpoint. Returns `false`
    /// if the task was not paused.
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|flags| {
            if !flags.is_paused {
                return false;
            }
            flags.is_paused = false;
            true
        })
    }

    /// Set the cancel flag and release any parked checkpoint so it can
    /// observe the cancellation. Returns `false` if already cancelled.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|flags| {
            if flags.is_cancelled {
                return false;
            }
            flags.is_cancelled = true;
            flags.is_paused = false;
            true
        })
    }
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Executor-side handle used to cooperate with pause and cancel requests.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    id: TaskId,
    rx: watch::Receiver<ControlFlags>,
}

impl Checkpoint {
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Whether a cancel request is pending, without suspending.
    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_cancelled
    }

    /// Cooperative checkpoint.
    ///
    /// Returns immediately when neither flag is set, fails with
    /// [`Cancelled`] when the task was cancelled, and otherwise parks until
    /// the task is resumed or cancelled. If the scheduler drops the control
    /// block while we are parked, that also counts as cancellation.
    pub async fn check_signal(&self) -> Result<(), Cancelled> {
        let flags = *self.rx.borrow();
        if flags.is_cancelled {
            return Err(Cancelled { id: self.id });
        }
        if !flags.is_paused {
            return Ok(());
        }

        debug!(task_id = self.id, "task is pausing at checkpoint");

        let mut rx = self.rx.clone();
        let released = rx
            .wait_for(|flags| !flags.is_paused || flags.is_cancelled)
            .await
            .map(|flags| *flags);

        match released {
            Ok(flags) if !flags.is_cancelled => {
                debug!(task_id = self.id, "task released from checkpoint");
                Ok(())
            }
            _ => Err(Cancelled { id: self.id }),
        }
    }
}
