// src/types.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

/// Identifier of a task; unique among every task a scheduler has seen.
pub type TaskId = u64;

/// Where finished-task history is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStorageMode {
    /// Store history as JSON in a file (`.taskgate/history.json`).
    File,
    /// Keep history in memory only (lost on exit).
    Memory,
}

impl Default for HistoryStorageMode {
    fn default() -> Self {
        HistoryStorageMode::File
    }
}

/// Scripted request forwarded to the scheduler by id, the way a user would
/// press a pause / resume / cancel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
}

static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Timestamp in milliseconds since the Unix epoch.
///
/// Epoch-based so persisted history stays comparable across runs, but never
/// smaller than a value already handed out in this process: a wall clock
/// stepping backwards yields the previous timestamp again.
pub fn now_millis() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let previous = LAST_MILLIS.fetch_max(wall, Ordering::Relaxed);
    previous.max(wall)
}
