// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::history::DEFAULT_HISTORY_PATH;
use crate::types::{ControlAction, HistoryStorageMode};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// max_concurrency = 2
///
/// [history]
/// storage = "file"
/// path = ".taskgate/history.json"
///
/// [[task]]
/// name = "download"
/// duration = "2s"
/// steps = 4
///
/// [[control]]
/// at = "500ms"
/// action = "pause"
/// task = "download"
/// ```
///
/// All sections are optional and have reasonable defaults, but validation
/// requires at least one task.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub history: HistorySection,

    /// Workload tasks, submitted in file order.
    #[serde(default)]
    pub task: Vec<WorkloadTask>,

    /// Scripted pause / resume / cancel requests.
    #[serde(default)]
    pub control: Vec<ControlEntry>,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Number of tasks allowed to run at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    2
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// `[history]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    #[serde(default)]
    pub storage: HistoryStorageMode,

    /// File used when `storage = "file"`.
    #[serde(default = "default_history_path")]
    pub path: PathBuf,

    /// Seed the scheduler with previously persisted history so new runs
    /// append to it instead of replacing it.
    #[serde(default = "default_keep_previous")]
    pub keep_previous: bool,
}

fn default_history_path() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY_PATH)
}

fn default_keep_previous() -> bool {
    true
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            storage: HistoryStorageMode::default(),
            path: default_history_path(),
            keep_previous: default_keep_previous(),
        }
    }
}

/// `[[task]]` entry: a simulated unit of work.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadTask {
    pub name: String,

    /// Total run time, e.g. `"2s"` or `"250ms"`.
    #[serde(default = "default_duration")]
    pub duration: String,

    /// Number of checkpoints spread evenly over `duration`.
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Fail after the last step instead of completing.
    #[serde(default)]
    pub fail: bool,
}

fn default_duration() -> String {
    "1s".to_string()
}

fn default_steps() -> u32 {
    10
}

/// `[[control]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlEntry {
    /// Offset from start-up, e.g. `"1s"`.
    pub at: String,
    pub action: ControlAction,
    /// Name of the target `[[task]]`.
    pub task: String,
}

/// Validated configuration with durations resolved.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub history: HistorySection,
    pub tasks: Vec<TaskPlan>,
    pub controls: Vec<ControlPlan>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        history: HistorySection,
        tasks: Vec<TaskPlan>,
        controls: Vec<ControlPlan>,
    ) -> Self {
        Self {
            scheduler,
            history,
            tasks,
            controls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    pub name: String,
    pub duration: Duration,
    pub steps: u32,
    pub fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlan {
    pub at: Duration,
    pub action: ControlAction,
    pub task: String,
}
