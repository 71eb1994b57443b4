// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod history;
pub mod logging;
pub mod report;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, ControlPlan, load_and_validate};
use crate::engine::{Scheduler, SchedulerCore};
use crate::errors::TaskgateError;
use crate::events::EventBus;
use crate::exec::build_task;
use crate::history::HistoryStore;
use crate::report::{ConsoleReporter, render_history};
use crate::task::{Task, TaskSnapshot};
use crate::types::{ControlAction, TaskId};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - history store (and seeding from previous runs)
/// - scheduler loop + console reporter
/// - the scripted control timeline
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)?;
    if let Some(max_concurrency) = args.max_concurrency {
        cfg.scheduler.max_concurrency = max_concurrency;
    }

    let store = history::open_store(&cfg.history);

    if args.clear_history {
        store.clear()?;
        println!("history cleared");
        return Ok(());
    }
    if args.show_history {
        print_history(&store.load_history()?);
        return Ok(());
    }
    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let previous = previous_history(&cfg, store.as_ref());
    let first_id = previous.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
    let seeded = previous.into_iter().map(Task::from_snapshot).collect();
    let core = SchedulerCore::with_history(cfg.scheduler.max_concurrency, seeded);

    let bus = EventBus::new();
    ConsoleReporter::attach(&bus);
    let (scheduler, loop_handle) = Scheduler::start_with_core(core, bus, Arc::clone(&store));

    // Ctrl-C → cancel everything and stop.
    {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; shutting down");
            let _ = scheduler.shutdown().await;
        });
    }

    let started = Instant::now();
    let mut ids: HashMap<String, TaskId> = HashMap::new();
    for (offset, plan) in cfg.tasks.iter().enumerate() {
        let id = first_id + offset as TaskId;
        ids.insert(plan.name.clone(), id);
        scheduler.add_task(build_task(id, plan)).await?;
    }

    let timeline = spawn_control_timeline(scheduler.clone(), started, &cfg.controls, &ids);

    match scheduler.wait_idle().await {
        Ok(()) => info!(elapsed = ?started.elapsed(), "workload finished"),
        Err(TaskgateError::SchedulerClosed) => info!("scheduler stopped before the workload finished"),
        Err(err) => return Err(err.into()),
    }
    timeline.abort();

    if !scheduler.is_closed() {
        print_summary(&scheduler, &cfg, &ids).await?;
        scheduler.shutdown().await?;
    }

    loop_handle.await??;
    Ok(())
}

fn previous_history(cfg: &ConfigFile, store: &dyn HistoryStore) -> Vec<TaskSnapshot> {
    if !cfg.history.keep_previous {
        return Vec::new();
    }
    match store.load_history() {
        Ok(entries) => {
            debug!(entries = entries.len(), "loaded previous history");
            entries
        }
        Err(err) => {
            warn!(error = %err, "could not load previous history; starting empty");
            Vec::new()
        }
    }
}

/// Fire `[[control]]` entries at their offsets from `started`, by task id.
fn spawn_control_timeline(
    scheduler: Scheduler,
    started: Instant,
    controls: &[ControlPlan],
    ids: &HashMap<String, TaskId>,
) -> JoinHandle<()> {
    let timeline: Vec<(ControlPlan, TaskId)> = controls
        .iter()
        .filter_map(|plan| ids.get(&plan.task).map(|id| (plan.clone(), *id)))
        .collect();

    tokio::spawn(async move {
        for (plan, id) in timeline {
            sleep_until(started + plan.at).await;

            let applied = match plan.action {
                ControlAction::Pause => scheduler.pause_task(id).await,
                ControlAction::Resume => scheduler.resume_task(id).await,
                ControlAction::Cancel => scheduler.cancel_task(id).await,
            };
            match applied {
                Ok(true) => debug!(task_id = id, action = ?plan.action, "control applied"),
                Ok(false) => info!(task_id = id, action = ?plan.action, task = %plan.task, "control had no effect"),
                Err(_) => return,
            }
        }
    })
}

async fn print_summary(
    scheduler: &Scheduler,
    cfg: &ConfigFile,
    ids: &HashMap<String, TaskId>,
) -> Result<()> {
    println!();
    println!("summary:");
    for plan in &cfg.tasks {
        let Some(&id) = ids.get(&plan.name) else {
            continue;
        };
        let status = scheduler
            .status_of(id)
            .await?
            .map(|s| s.as_str())
            .unwrap_or("UNKNOWN");
        println!("  #{id:<4} {status:<10} {}", plan.name);
    }
    Ok(())
}

fn print_history(entries: &[TaskSnapshot]) {
    if entries.is_empty() {
        println!("no history");
        return;
    }
    println!("history ({}):", entries.len());
    for line in render_history(entries) {
        println!("  {line}");
    }
}

/// Simple dry-run output: print scheduler settings, tasks and controls.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskgate dry-run");
    println!("  scheduler.max_concurrency = {}", cfg.scheduler.max_concurrency);
    println!("  history.storage = {:?}", cfg.history.storage);
    println!("  history.path = {}", cfg.history.path.display());
    println!("  history.keep_previous = {}", cfg.history.keep_previous);
    println!();

    println!("tasks ({}):", cfg.tasks.len());
    for task in &cfg.tasks {
        println!("  - {}", task.name);
        println!("      duration: {:?} in {} step(s)", task.duration, task.steps);
        if task.fail {
            println!("      fail: true");
        }
    }

    if !cfg.controls.is_empty() {
        println!();
        println!("controls ({}):", cfg.controls.len());
        for control in &cfg.controls {
            println!("  - at {:?}: {:?} {}", control.at, control.action, control.task);
        }
    }

    debug!("dry-run complete (no execution)");
}
