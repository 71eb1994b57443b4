// src/history/mod.rs

//! Persistence of finished tasks.
//!
//! The scheduler calls [`HistoryStore::save_history`] with its whole history
//! (COMPLETED and FAILED tasks) each time a dispatched task is torn down.
//! Stores only ever see [`TaskSnapshot`]s; executors and control state are
//! never persisted.

pub mod file;
pub mod memory;

pub use file::FileHistoryStore;
pub use memory::MemoryHistoryStore;

use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::Result;
use crate::task::TaskSnapshot;
use crate::types::HistoryStorageMode;

/// Default location of the file-backed history.
pub const DEFAULT_HISTORY_PATH: &str = ".taskgate/history.json";

pub trait HistoryStore: Send + Sync + Debug {
    /// Replace the persisted history with `tasks`.
    fn save_history(&self, tasks: &[TaskSnapshot]) -> Result<()>;
    /// Load persisted history; an empty store yields an empty vector.
    fn load_history(&self) -> Result<Vec<TaskSnapshot>>;
    /// Remove all persisted history.
    fn clear(&self) -> Result<()>;
}

/// Open the store selected by a `[history]` config section.
pub fn open_store(section: &crate::config::HistorySection) -> Arc<dyn HistoryStore> {
    match section.storage {
        HistoryStorageMode::File => Arc::new(FileHistoryStore::new(section.path.clone())),
        HistoryStorageMode::Memory => Arc::new(MemoryHistoryStore::new()),
    }
}
