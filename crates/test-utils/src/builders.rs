#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::bail;
use tokio::time::sleep;

use taskgate::config::{
    ConfigFile, ControlEntry, HistorySection, RawConfigFile, SchedulerSection, WorkloadTask,
};
use taskgate::errors::TaskgateError;
use taskgate::task::Task;
use taskgate::types::{ControlAction, HistoryStorageMode, TaskId};

/// Sleeps for `duration` without ever calling the checkpoint.
pub fn sleeping_task(id: TaskId, name: &str, duration: Duration) -> Task {
    Task::new(id, name, move |_checkpoint| async move {
        sleep(duration).await;
        Ok(())
    })
}

/// Runs `steps` units of `unit` each, checking the gate before every unit
/// and bumping `progress` after it.
pub fn stepping_task(
    id: TaskId,
    name: &str,
    steps: usize,
    unit: Duration,
    progress: Arc<AtomicUsize>,
) -> Task {
    Task::new(id, name, move |checkpoint| async move {
        for _ in 0..steps {
            checkpoint.check_signal().await?;
            sleep(unit).await;
            progress.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    })
}

/// Fails after `after` with `message`.
pub fn failing_task(id: TaskId, name: &str, after: Duration, message: &str) -> Task {
    let message = message.to_string();
    Task::new(id, name, move |_checkpoint| async move {
        sleep(after).await;
        bail!("{message}")
    })
}

pub fn panicking_task(id: TaskId, name: &str) -> Task {
    Task::new(id, name, |_checkpoint| explode())
}

async fn explode() -> anyhow::Result<()> {
    panic!("executor blew up")
}

/// Tracks how many gauged executors are inside their body at once.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Non-cooperating task that counts itself while it sleeps.
    pub fn task(&self, id: TaskId, name: &str, duration: Duration) -> Task {
        let gauge = self.clone();
        Task::new(id, name, move |_checkpoint| async move {
            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(now, Ordering::SeqCst);
            sleep(duration).await;
            gauge.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                history: HistorySection::default(),
                task: Vec::new(),
                control: Vec::new(),
            },
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.scheduler.max_concurrency = n;
        self
    }

    pub fn memory_history(mut self) -> Self {
        self.config.history.storage = HistoryStorageMode::Memory;
        self
    }

    pub fn with_task(mut self, task: WorkloadTask) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn with_control(mut self, at: &str, action: ControlAction, task: &str) -> Self {
        self.config.control.push(ControlEntry {
            at: at.to_string(),
            action,
            task: task.to_string(),
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile, TaskgateError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `WorkloadTask`.
pub struct WorkloadTaskBuilder {
    task: WorkloadTask,
}

impl WorkloadTaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: WorkloadTask {
                name: name.to_string(),
                duration: "1s".to_string(),
                steps: 10,
                fail: false,
            },
        }
    }

    pub fn duration(mut self, duration: &str) -> Self {
        self.task.duration = duration.to_string();
        self
    }

    pub fn steps(mut self, steps: u32) -> Self {
        self.task.steps = steps;
        self
    }

    pub fn fail(mut self) -> Self {
        self.task.fail = true;
        self
    }

    pub fn build(self) -> WorkloadTask {
        self.task
    }
}
