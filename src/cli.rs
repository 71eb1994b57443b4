// src/cli.rs

//! CLI argument parsing using `clap` (derive).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `taskgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskgate",
    version,
    about = "Run a workload of pausable, cancellable tasks under a concurrency limit.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Override `[scheduler].max_concurrency` from the config.
    #[arg(long, value_name = "N", value_parser = parse_concurrency)]
    pub max_concurrency: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKGATE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the workload, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print persisted history and exit.
    #[arg(long, conflicts_with = "clear_history")]
    pub show_history: bool,

    /// Remove persisted history and exit.
    #[arg(long)]
    pub clear_history: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number '{s}': {e}"))?;
    if value == 0 {
        return Err("max concurrency must be at least 1".to_string());
    }
    Ok(value)
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_taskgate_toml() {
        let args = CliArgs::try_parse_from(["taskgate"]).unwrap();
        assert_eq!(args.config, PathBuf::from("Taskgate.toml"));
        assert_eq!(args.max_concurrency, None);
        assert!(!args.dry_run);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(CliArgs::try_parse_from(["taskgate", "--max-concurrency", "0"]).is_err());
        let args = CliArgs::try_parse_from(["taskgate", "--max-concurrency", "3"]).unwrap();
        assert_eq!(args.max_concurrency, Some(3));
    }

    #[test]
    fn history_flags_are_exclusive() {
        assert!(
            CliArgs::try_parse_from(["taskgate", "--show-history", "--clear-history"]).is_err()
        );
    }
}
