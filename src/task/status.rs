// src/task/status.rs

//! Task lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TaskgateError;

/// Lifecycle state of a [`Task`](super::Task).
///
/// ```text
/// CREATED -> QUEUED -> RUNNING -> COMPLETED | FAILED | CANCELED
///                      RUNNING <-> PAUSED
/// ```
///
/// `Completed`, `Failed` and `Canceled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Status {
    Created,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Canceled,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Created,
        Status::Queued,
        Status::Running,
        Status::Paused,
        Status::Completed,
        Status::Failed,
        Status::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Created => "CREATED",
            Status::Queued => "QUEUED",
            Status::Running => "RUNNING",
            Status::Paused => "PAUSED",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
            Status::Canceled => "CANCELED",
        }
    }

    /// Whether no further transition is allowed out of this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Canceled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TaskgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TaskgateError::InvalidTransition(wanted.to_string()))
    }
}

impl TryFrom<String> for Status {
    type Error = TaskgateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
