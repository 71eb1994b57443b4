// src/exec/workload.rs

//! Simulated work described by `[[task]]` config entries.

use anyhow::bail;
use tokio::time::sleep;
use tracing::debug;

use crate::config::TaskPlan;
use crate::task::Task;
use crate::types::TaskId;

/// Build a cooperating task from a plan.
///
/// The executor splits `duration` into `steps` equal sleeps and calls the
/// checkpoint before each one, so it can be paused or cancelled between
/// steps. With `fail = true` it returns an error after the last step.
pub fn build_task(id: TaskId, plan: &TaskPlan) -> Task {
    let steps = plan.steps.max(1);
    let step = plan.duration / steps;
    let fail = plan.fail;
    let name = plan.name.clone();

    Task::new(id, plan.name.clone(), move |checkpoint| async move {
        for done in 0..steps {
            checkpoint.check_signal().await?;
            sleep(step).await;
            debug!(task_id = id, task = %name, step = done + 1, steps, "workload step done");
        }

        if fail {
            bail!("task '{name}' failed after {steps} steps");
        }
        Ok(())
    })
}
