// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::task::Status;
use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum TaskgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Target status is not one of the known task states.
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Task {0} was already submitted to this scheduler")]
    DuplicateTask(TaskId),

    #[error("Task {id} cannot be scheduled from status {status}")]
    NotSchedulable { id: TaskId, status: Status },

    #[error("Scheduler loop is no longer running")]
    SchedulerClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskgateError>;
