// src/history/file.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::history::HistoryStore;
use crate::task::TaskSnapshot;

/// History stored as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct FileHistoryStore<F: FileSystem = RealFileSystem> {
    fs: F,
    path: PathBuf,
}

impl FileHistoryStore<RealFileSystem> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(RealFileSystem, path)
    }
}

impl<F: FileSystem> FileHistoryStore<F> {
    pub fn with_fs(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<F: FileSystem> HistoryStore for FileHistoryStore<F> {
    fn save_history(&self, tasks: &[TaskSnapshot]) -> Result<()> {
        let data = serde_json::to_vec_pretty(tasks)?;
        self.fs.write(&self.path, &data)?;
        debug!(path = ?self.path, entries = tasks.len(), "history saved");
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<TaskSnapshot>> {
        if !self.fs.exists(&self.path) {
            return Ok(Vec::new());
        }
        let data = self.fs.read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn clear(&self) -> Result<()> {
        if self.fs.exists(&self.path) {
            self.fs.remove_file(&self.path)?;
            debug!(path = ?self.path, "history cleared");
        }
        Ok(())
    }
}
