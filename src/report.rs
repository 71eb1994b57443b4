// src/report.rs

//! Console output for the `taskgate` binary.
//!
//! The reporter is just another bus subscriber; the scheduler does not know
//! it exists. Lines go to stdout, logs stay on stderr.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::{EventBus, SubscriptionId, TaskEvent};
use crate::task::TaskSnapshot;
use crate::types::TaskId;

/// Renders lifecycle events as one line each.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    /// Names learned from `task:queued`; later events only carry ids.
    names: Arc<Mutex<HashMap<TaskId, String>>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new reporter to every event kind on `bus`.
    pub fn attach(bus: &EventBus) -> SubscriptionId {
        let reporter = Self::new();
        bus.subscribe_all(move |event| {
            println!("{}", reporter.render(event));
            Ok(())
        })
    }

    pub fn render(&self, event: &TaskEvent) -> String {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if let TaskEvent::Queued { id, name } = event {
            names.insert(*id, name.clone());
        }

        let id = event.task_id();
        let label = match names.get(&id) {
            Some(name) => format!("#{id} {name}"),
            None => format!("#{id}"),
        };

        let detail = match event {
            TaskEvent::Started { status, .. } => format!(" ({status})"),
            TaskEvent::Failed { error, .. } => format!(": {error}"),
            TaskEvent::Finished {
                status,
                slots_available,
                ..
            } => format!(" as {status}, {slots_available} slot(s) free"),
            _ => String::new(),
        };

        format!("{:<15} {label}{detail}", event.kind().as_str())
    }
}

/// One line per persisted task, oldest first.
pub fn render_history(entries: &[TaskSnapshot]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let took = match (entry.started_at, entry.completed_at) {
                (Some(start), Some(end)) => format!("{}ms", end.saturating_sub(start)),
                _ => "-".to_string(),
            };
            let mut line = format!(
                "#{:<4} {:<10} {:<20} {took}",
                entry.id,
                entry.status.as_str(),
                entry.name
            );
            if let Some(error) = &entry.error {
                line.push_str(&format!("  error: {error}"));
            }
            line
        })
        .collect()
}
