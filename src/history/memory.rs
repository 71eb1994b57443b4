// src/history/memory.rs

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::Result;
use crate::history::HistoryStore;
use crate::task::TaskSnapshot;

#[derive(Debug, Default)]
struct MemoryState {
    saved: Vec<TaskSnapshot>,
    saves: usize,
}

/// History kept in process memory; also counts how often it was saved.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with previously persisted entries.
    pub fn with_entries(entries: Vec<TaskSnapshot>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                saved: entries,
                saves: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `save_history` calls so far.
    pub fn save_count(&self) -> usize {
        self.state().saves
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save_history(&self, tasks: &[TaskSnapshot]) -> Result<()> {
        let mut state = self.state();
        state.saved = tasks.to_vec();
        state.saves += 1;
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<TaskSnapshot>> {
        Ok(self.state().saved.clone())
    }

    fn clear(&self) -> Result<()> {
        self.state().saved.clear();
        Ok(())
    }
}
