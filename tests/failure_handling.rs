use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use taskgate::engine::{ExecutionOutcome, Scheduler};
use taskgate::events::{EventBus, EventKind, TaskEvent};
use taskgate::exec::classify_error;
use taskgate::history::{HistoryStore, MemoryHistoryStore};
use taskgate::task::{Cancelled, Status, Task};
use taskgate_test_utils::builders::{failing_task, panicking_task, sleeping_task};
use taskgate_test_utils::{EventRecorder, init_tracing, with_timeout};

const UNIT: Duration = Duration::from_millis(100);

fn start(max_concurrency: usize) -> (Scheduler, EventRecorder, Arc<MemoryHistoryStore>) {
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus);
    let store = Arc::new(MemoryHistoryStore::new());
    let (scheduler, _handle) = Scheduler::start(max_concurrency, bus, store.clone());
    (scheduler, recorder, store)
}

#[tokio::test(start_paused = true)]
async fn executor_error_marks_the_task_failed_and_frees_the_slot() {
    init_tracing();
    let (scheduler, recorder, store) = start(1);

    scheduler
        .add_task(failing_task(1, "broken", UNIT, "disk full"))
        .await
        .unwrap();
    scheduler.add_task(sleeping_task(2, "fine", UNIT)).await.unwrap();

    with_timeout(scheduler.wait_idle()).await.unwrap();

    let failed = scheduler.snapshot(1).await.unwrap().unwrap();
    assert_eq!(failed.status, Status::Failed);
    assert_eq!(failed.error.as_deref(), Some("disk full"));
    assert!(failed.completed_at.is_some());
    assert_eq!(scheduler.status_of(2).await.unwrap(), Some(Status::Completed));

    assert!(recorder.events().contains(&TaskEvent::Failed {
        id: 1,
        error: "disk full".to_string()
    }));
    assert_eq!(
        recorder.kinds_for(1),
        vec![
            EventKind::Queued,
            EventKind::Started,
            EventKind::Failed,
            EventKind::Finished
        ]
    );

    let persisted = store.load_history().unwrap();
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[0].status, Status::Failed);
    assert_eq!(persisted[1].status, Status::Completed);
}

#[tokio::test(start_paused = true)]
async fn executor_panic_is_reported_as_a_failure() {
    init_tracing();
    let (scheduler, recorder, _store) = start(1);

    scheduler.add_task(panicking_task(1, "explodes")).await.unwrap();
    scheduler.add_task(sleeping_task(2, "survivor", UNIT)).await.unwrap();

    with_timeout(scheduler.wait_idle()).await.unwrap();

    let snapshot = scheduler.snapshot(1).await.unwrap().unwrap();
    assert_eq!(snapshot.status, Status::Failed);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("executor panicked: executor blew up")
    );
    assert_eq!(scheduler.status_of(2).await.unwrap(), Some(Status::Completed));
    assert_eq!(recorder.ids_of(EventKind::Failed), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn error_context_is_kept_in_the_failure_message() {
    init_tracing();
    let (scheduler, _recorder, _store) = start(1);

    let task = Task::new(1, "nested", |_checkpoint| async move {
        let inner: anyhow::Result<()> = Err(anyhow!("connection reset"));
        anyhow::Context::context(inner, "fetching chunk 3")
    });
    scheduler.add_task(task).await.unwrap();
    with_timeout(scheduler.wait_idle()).await.unwrap();

    let snapshot = scheduler.snapshot(1).await.unwrap().unwrap();
    assert_eq!(
        snapshot.error.as_deref(),
        Some("fetching chunk 3: connection reset")
    );
}

#[test]
fn cancellation_is_recognised_anywhere_in_the_error_chain() {
    let plain = anyhow::Error::new(Cancelled { id: 4 });
    assert_eq!(classify_error(&plain), ExecutionOutcome::Cancelled);

    let wrapped = anyhow::Error::new(Cancelled { id: 4 }).context("while uploading");
    assert_eq!(classify_error(&wrapped), ExecutionOutcome::Cancelled);

    let other = anyhow!("task 4 has been cancelled");
    assert_eq!(
        classify_error(&other),
        ExecutionOutcome::Failed("task 4 has been cancelled".to_string())
    );
}
