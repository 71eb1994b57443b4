// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::model::{ConfigFile, ControlPlan, RawConfigFile, TaskPlan};
use crate::errors::{Result, TaskgateError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskgateError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_scheduler(&raw)?;
        let tasks = resolve_tasks(&raw)?;
        let controls = resolve_controls(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.scheduler,
            raw.history,
            tasks,
            controls,
        ))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskgateError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.max_concurrency == 0 {
        return Err(TaskgateError::ConfigError(
            "[scheduler].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn resolve_tasks(cfg: &RawConfigFile) -> Result<Vec<TaskPlan>> {
    let mut names = HashSet::new();
    let mut plans = Vec::with_capacity(cfg.task.len());

    for task in &cfg.task {
        let name = task.name.trim();
        if name.is_empty() {
            return Err(TaskgateError::ConfigError(
                "every [[task]] needs a non-empty name".to_string(),
            ));
        }
        if !names.insert(name) {
            return Err(TaskgateError::ConfigError(format!(
                "task '{}' is defined more than once",
                name
            )));
        }
        if task.steps == 0 {
            return Err(TaskgateError::ConfigError(format!(
                "task '{}' must have steps >= 1",
                name
            )));
        }
        let duration = parse_duration(&task.duration).map_err(|e| {
            TaskgateError::ConfigError(format!("task '{}' has invalid duration: {}", name, e))
        })?;

        plans.push(TaskPlan {
            name: name.to_string(),
            duration,
            steps: task.steps,
            fail: task.fail,
        });
    }

    Ok(plans)
}

fn resolve_controls(cfg: &RawConfigFile) -> Result<Vec<ControlPlan>> {
    let mut plans = Vec::with_capacity(cfg.control.len());

    for entry in &cfg.control {
        let target = entry.task.trim();
        if !cfg.task.iter().any(|t| t.name.trim() == target) {
            return Err(TaskgateError::ConfigError(format!(
                "control entry refers to unknown task '{}'",
                target
            )));
        }
        let at = parse_duration(&entry.at).map_err(|e| {
            TaskgateError::ConfigError(format!(
                "control entry for task '{}' has invalid `at`: {}",
                target, e
            ))
        })?;

        plans.push(ControlPlan {
            at,
            action: entry.action,
            task: target.to_string(),
        });
    }

    // Fire in time order; entries with the same offset keep file order.
    plans.sort_by_key(|plan| plan.at);
    Ok(plans)
}

/// Parse a duration written as an integer and a unit: `ms`, `s`, `m` or `h`
/// (e.g. `"250ms"`, `"3s"`, `"2m"`).
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit (ms, s, m or h)"))?;
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return Err(format!("duration '{s}' must start with a number"));
    }

    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid duration number '{digits}': {e}"))?;

    let millis_per_unit: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(format!(
                "unsupported duration unit '{other}'; expected ms, s, m or h"
            ));
        }
    };

    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
