use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use taskgate::config::{ConfigFile, load_and_validate, parse_and_validate, parse_duration};
use taskgate::engine::Scheduler;
use taskgate::errors::TaskgateError;
use taskgate::events::EventBus;
use taskgate::exec::build_task;
use taskgate::history::MemoryHistoryStore;
use taskgate::task::Status;
use taskgate::types::{ControlAction, HistoryStorageMode};
use taskgate_test_utils::builders::{ConfigFileBuilder, WorkloadTaskBuilder};
use taskgate_test_utils::{init_tracing, with_timeout};

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Taskgate.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn config_error(result: Result<ConfigFile, TaskgateError>) -> String {
    match result {
        Err(TaskgateError::ConfigError(message)) => message,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn full_config_is_loaded_and_resolved() {
    let (_dir, path) = write_config(
        r#"
        [scheduler]
        max_concurrency = 3

        [history]
        storage = "memory"
        keep_previous = false

        [[task]]
        name = "download"
        duration = "2s"
        steps = 4

        [[task]]
        name = "flaky"
        duration = "250ms"
        fail = true

        [[control]]
        at = "1s"
        action = "cancel"
        task = "flaky"

        [[control]]
        at = "500ms"
        action = "pause"
        task = "download"
        "#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.scheduler.max_concurrency, 3);
    assert_eq!(cfg.history.storage, HistoryStorageMode::Memory);
    assert!(!cfg.history.keep_previous);

    assert_eq!(cfg.tasks.len(), 2);
    assert_eq!(cfg.tasks[0].name, "download");
    assert_eq!(cfg.tasks[0].duration, Duration::from_secs(2));
    assert_eq!(cfg.tasks[0].steps, 4);
    assert!(!cfg.tasks[0].fail);
    assert_eq!(cfg.tasks[1].steps, 10);
    assert!(cfg.tasks[1].fail);

    // Controls come back in time order.
    assert_eq!(cfg.controls.len(), 2);
    assert_eq!(cfg.controls[0].at, Duration::from_millis(500));
    assert_eq!(cfg.controls[0].action, ControlAction::Pause);
    assert_eq!(cfg.controls[1].task, "flaky");
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let (_dir, path) = write_config(
        r#"
        [[task]]
        name = "only"
        "#,
    );

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.scheduler.max_concurrency, 2);
    assert_eq!(cfg.history.storage, HistoryStorageMode::File);
    assert_eq!(cfg.history.path, PathBuf::from(".taskgate/history.json"));
    assert!(cfg.history.keep_previous);
    assert_eq!(cfg.tasks[0].duration, Duration::from_secs(1));
    assert!(cfg.controls.is_empty());
}

#[test]
fn config_without_tasks_is_rejected() {
    let message = config_error(ConfigFileBuilder::new().try_build());
    assert!(message.contains("at least one [[task]]"));
}

#[test]
fn zero_concurrency_is_rejected() {
    let message = config_error(
        ConfigFileBuilder::new()
            .max_concurrency(0)
            .with_task(WorkloadTaskBuilder::new("a").build())
            .try_build(),
    );
    assert!(message.contains("max_concurrency"));
}

#[test]
fn duplicate_task_names_are_rejected() {
    let message = config_error(
        ConfigFileBuilder::new()
            .with_task(WorkloadTaskBuilder::new("same").build())
            .with_task(WorkloadTaskBuilder::new(" same ").build())
            .try_build(),
    );
    assert!(message.contains("'same' is defined more than once"));
}

#[test]
fn zero_steps_and_bad_durations_are_rejected() {
    let message = config_error(
        ConfigFileBuilder::new()
            .with_task(WorkloadTaskBuilder::new("a").steps(0).build())
            .try_build(),
    );
    assert!(message.contains("steps >= 1"));

    let message = config_error(
        ConfigFileBuilder::new()
            .with_task(WorkloadTaskBuilder::new("a").duration("soon").build())
            .try_build(),
    );
    assert!(message.contains("invalid duration"));
}

#[test]
fn controls_must_target_known_tasks() {
    let message = config_error(
        ConfigFileBuilder::new()
            .with_task(WorkloadTaskBuilder::new("a").build())
            .with_control("1s", ControlAction::Pause, "b")
            .try_build(),
    );
    assert!(message.contains("unknown task 'b'"));

    let message = config_error(
        ConfigFileBuilder::new()
            .with_task(WorkloadTaskBuilder::new("a").build())
            .with_control("later", ControlAction::Resume, "a")
            .try_build(),
    );
    assert!(message.contains("invalid `at`"));
}

#[test]
fn unknown_control_action_is_a_toml_error() {
    let (_dir, path) = write_config(
        r#"
        [[task]]
        name = "a"

        [[control]]
        at = "1s"
        action = "restart"
        task = "a"
        "#,
    );
    assert!(matches!(
        load_and_validate(&path),
        Err(TaskgateError::TomlError(_))
    ));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("absent.toml")),
        Err(TaskgateError::IoError(_))
    ));
}

#[test]
fn durations_accept_common_units() {
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("18446744073709551615h").is_err());
}

#[test]
fn inline_config_text_can_be_validated() {
    let cfg = parse_and_validate(
        r#"
        [scheduler]
        max_concurrency = 1

        [[task]]
        name = "inline"
        duration = "2s"
        steps = 2
        "#,
    )
    .unwrap();
    assert_eq!(cfg.scheduler.max_concurrency, 1);
    assert_eq!(cfg.tasks[0].duration, Duration::from_secs(2));

    assert!(matches!(
        parse_and_validate("[scheduler]\nmax_concurrency = \"two\""),
        Err(TaskgateError::TomlError(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn workload_tasks_run_for_their_configured_duration() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .memory_history()
        .with_task(
            WorkloadTaskBuilder::new("steady")
                .duration("400ms")
                .steps(4)
                .build(),
        )
        .with_task(
            WorkloadTaskBuilder::new("doomed")
                .duration("100ms")
                .steps(2)
                .fail()
                .build(),
        )
        .build();

    let (scheduler, _handle) = Scheduler::start(
        cfg.scheduler.max_concurrency,
        EventBus::new(),
        std::sync::Arc::new(MemoryHistoryStore::new()),
    );
    let started = tokio::time::Instant::now();
    for (index, plan) in cfg.tasks.iter().enumerate() {
        scheduler
            .add_task(build_task(index as u64 + 1, plan))
            .await
            .unwrap();
    }
    with_timeout(scheduler.wait_idle()).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_millis(400));
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Completed));

    let doomed = scheduler.snapshot(2).await.unwrap().unwrap();
    assert_eq!(doomed.status, Status::Failed);
    assert_eq!(
        doomed.error.as_deref(),
        Some("task 'doomed' failed after 2 steps")
    );
}

#[tokio::test(start_paused = true)]
async fn workload_tasks_can_be_cancelled_between_steps() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task(
            WorkloadTaskBuilder::new("long")
                .duration("10s")
                .steps(10)
                .build(),
        )
        .build();

    let (scheduler, _handle) = Scheduler::start(
        1,
        EventBus::new(),
        std::sync::Arc::new(MemoryHistoryStore::new()),
    );
    scheduler.add_task(build_task(1, &cfg.tasks[0])).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(scheduler.cancel_task(1).await.unwrap());

    let started = tokio::time::Instant::now();
    with_timeout(scheduler.wait_idle()).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(500));
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Canceled));
}
