// src/exec/task_runner.rs

//! Individual executor driver.

use std::any::Any;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

use crate::engine::{ExecutionOutcome, ExecutorReport, Launch};
use crate::task::Cancelled;

/// Run a dispatched executor on its own Tokio task and send exactly one
/// [`ExecutorReport`] when it ends, whatever the way it ends.
///
/// The executor itself runs in a nested task so that a panic inside it is
/// turned into a failure report instead of silently losing the slot. The
/// returned handle aborts that nested task; an aborted executor is reported
/// as [`ExecutionOutcome::Cancelled`].
pub fn spawn_executor(launch: Launch, report_tx: mpsc::Sender<ExecutorReport>) -> AbortHandle {
    let Launch {
        id,
        name,
        executor,
        checkpoint,
    } = launch;

    info!(task_id = id, task = %name, "starting executor");
    let work = tokio::spawn(executor(checkpoint));
    let abort = work.abort_handle();

    tokio::spawn(async move {
        let outcome = match work.await {
            Ok(Ok(())) => ExecutionOutcome::Success,
            Ok(Err(err)) => classify_error(&err),
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic());
                error!(task_id = id, panic = %message, "executor panicked");
                ExecutionOutcome::Failed(format!("executor panicked: {message}"))
            }
            Err(join_err) if join_err.is_cancelled() => {
                info!(task_id = id, "executor aborted");
                ExecutionOutcome::Cancelled
            }
            Err(join_err) => ExecutionOutcome::Failed(join_err.to_string()),
        };

        debug!(task_id = id, ?outcome, "executor ended");

        if report_tx
            .send(ExecutorReport { id, outcome })
            .await
            .is_err()
        {
            debug!(task_id = id, "scheduler loop gone; dropping executor report");
        }
    });

    abort
}

/// Map an executor error to an outcome: a [`Cancelled`] anywhere in the
/// chain is the cancellation path, everything else is a failure.
pub fn classify_error(err: &anyhow::Error) -> ExecutionOutcome {
    if err.chain().any(|cause| cause.is::<Cancelled>()) {
        ExecutionOutcome::Cancelled
    } else {
        ExecutionOutcome::Failed(format!("{err:#}"))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
