// src/exec/mod.rs

//! Execution layer.
//!
//! - [`task_runner`] drives one dispatched executor on its own Tokio task and
//!   reports how it ended back to the scheduler loop.
//! - [`workload`] builds simulated executors from `[[task]]` config entries,
//!   used by the `taskgate` binary.

pub mod task_runner;
pub mod workload;

pub use task_runner::{classify_error, spawn_executor};
pub use workload::build_task;
