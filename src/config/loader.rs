// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_raw(&contents)
}

/// Deserialize TOML text; defaults come from the `serde` attributes.
pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Deserialize and validate TOML text.
pub fn parse_and_validate(contents: &str) -> Result<ConfigFile> {
    ConfigFile::try_from(parse_raw(contents)?)
}

/// Load a config file and validate it into a runnable [`ConfigFile`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let config = ConfigFile::try_from(load_from_path(path)?)?;
    debug!(
        path = ?path,
        tasks = config.tasks.len(),
        controls = config.controls.len(),
        "config loaded"
    );
    Ok(config)
}

/// `Taskgate.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskgate.toml")
}
