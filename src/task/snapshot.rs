// src/task/snapshot.rs

use serde::{Deserialize, Serialize};

use crate::task::Status;
use crate::types::TaskId;

/// Persisted projection of a [`Task`](super::Task).
///
/// Carries only data: the executor and the control block are never
/// serialised, and a task rebuilt from a snapshot can not be run again.
///
/// Timestamps are milliseconds since the Unix epoch from
/// [`now_millis`](crate::types::now_millis), which never decreases within
/// one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub status: Status,
    pub created_at: u64,
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub completed_at: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}
