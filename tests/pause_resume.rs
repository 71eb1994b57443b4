use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};

use taskgate::engine::Scheduler;
use taskgate::events::{EventBus, EventKind, TaskEvent};
use taskgate::history::MemoryHistoryStore;
use taskgate::task::Status;
use taskgate_test_utils::builders::{sleeping_task, stepping_task};
use taskgate_test_utils::{EventRecorder, init_tracing, with_timeout};

const UNIT: Duration = Duration::from_millis(100);

fn start(max_concurrency: usize) -> (Scheduler, EventRecorder) {
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus);
    let (scheduler, _handle) =
        Scheduler::start(max_concurrency, bus, Arc::new(MemoryHistoryStore::new()));
    (scheduler, recorder)
}

#[tokio::test(start_paused = true)]
async fn paused_task_stops_at_its_next_checkpoint_and_resumes_where_it_left_off() {
    init_tracing();
    let (scheduler, recorder) = start(1);
    let progress = Arc::new(AtomicUsize::new(0));
    let t0 = Instant::now();

    scheduler
        .add_task(stepping_task(1, "download", 10, UNIT, Arc::clone(&progress)))
        .await
        .unwrap();

    sleep_until(t0 + Duration::from_millis(250)).await;
    assert!(scheduler.pause_task(1).await.unwrap());
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Paused));

    // Step 3 was already under way and finishes; step 4 never starts.
    sleep_until(t0 + Duration::from_millis(550)).await;
    assert_eq!(progress.load(Ordering::SeqCst), 3);

    assert!(scheduler.resume_task(1).await.unwrap());
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Running));

    with_timeout(scheduler.wait_idle()).await.unwrap();

    assert_eq!(progress.load(Ordering::SeqCst), 10);
    assert_eq!(t0.elapsed(), Duration::from_millis(1250));
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Completed));
    assert_eq!(
        recorder.kinds_for(1),
        vec![
            EventKind::Queued,
            EventKind::Started,
            EventKind::Paused,
            EventKind::Resumed,
            EventKind::Completed,
            EventKind::Finished
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn paused_task_keeps_its_slot() {
    init_tracing();
    let (scheduler, _recorder) = start(1);
    let progress = Arc::new(AtomicUsize::new(0));

    scheduler
        .add_task(stepping_task(1, "parked", 5, UNIT, Arc::clone(&progress)))
        .await
        .unwrap();
    scheduler
        .add_task(sleeping_task(2, "waiting", UNIT))
        .await
        .unwrap();

    sleep(Duration::from_millis(150)).await;
    assert!(scheduler.pause_task(1).await.unwrap());

    sleep(Duration::from_secs(60)).await;
    let stats = scheduler.stats().await.unwrap();
    assert_eq!(stats.running, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.slots_available, 0);
    assert_eq!(scheduler.status_of(2).await.unwrap(), Some(Status::Queued));
    assert_eq!(progress.load(Ordering::SeqCst), 2);

    assert!(scheduler.resume_task(1).await.unwrap());
    with_timeout(scheduler.wait_idle()).await.unwrap();

    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Completed));
    assert_eq!(scheduler.status_of(2).await.unwrap(), Some(Status::Completed));
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_only_apply_to_matching_states() {
    init_tracing();
    let (scheduler, recorder) = start(1);
    let progress = Arc::new(AtomicUsize::new(0));

    scheduler
        .add_task(stepping_task(1, "running", 3, UNIT, Arc::clone(&progress)))
        .await
        .unwrap();
    scheduler
        .add_task(sleeping_task(2, "queued", UNIT))
        .await
        .unwrap();

    // Not paused yet.
    assert!(!scheduler.resume_task(1).await.unwrap());
    // Queued tasks can not be paused.
    assert!(!scheduler.pause_task(2).await.unwrap());
    // Unknown ids are ignored.
    assert!(!scheduler.pause_task(99).await.unwrap());
    assert!(!scheduler.resume_task(99).await.unwrap());

    assert!(scheduler.pause_task(1).await.unwrap());
    assert!(!scheduler.pause_task(1).await.unwrap());
    assert!(scheduler.resume_task(1).await.unwrap());
    assert!(!scheduler.resume_task(1).await.unwrap());

    with_timeout(scheduler.wait_idle()).await.unwrap();

    // Finished tasks ignore both.
    assert!(!scheduler.pause_task(1).await.unwrap());
    assert!(!scheduler.resume_task(1).await.unwrap());
    assert_eq!(recorder.count(EventKind::Paused), 1);
    assert_eq!(recorder.count(EventKind::Resumed), 1);
}

#[tokio::test(start_paused = true)]
async fn non_cooperating_task_reports_paused_but_runs_to_completion() {
    init_tracing();
    let (scheduler, recorder) = start(1);
    let t0 = Instant::now();

    scheduler
        .add_task(sleeping_task(1, "stubborn", Duration::from_millis(300)))
        .await
        .unwrap();

    sleep(UNIT).await;
    assert!(scheduler.pause_task(1).await.unwrap());

    with_timeout(scheduler.wait_idle()).await.unwrap();
    assert_eq!(t0.elapsed(), Duration::from_millis(300));
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Completed));
    assert!(recorder.events().contains(&TaskEvent::Paused(1)));
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_paused_task_releases_it() {
    init_tracing();
    let (scheduler, recorder) = start(1);
    let progress = Arc::new(AtomicUsize::new(0));

    scheduler
        .add_task(stepping_task(1, "parked", 10, UNIT, Arc::clone(&progress)))
        .await
        .unwrap();

    sleep(Duration::from_millis(150)).await;
    assert!(scheduler.pause_task(1).await.unwrap());
    sleep(Duration::from_secs(5)).await;

    assert!(scheduler.cancel_task(1).await.unwrap());
    assert!(!scheduler.resume_task(1).await.unwrap());
    with_timeout(scheduler.wait_idle()).await.unwrap();

    assert_eq!(progress.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.status_of(1).await.unwrap(), Some(Status::Canceled));
    assert_eq!(
        recorder.kinds_for(1),
        vec![
            EventKind::Queued,
            EventKind::Started,
            EventKind::Paused,
            EventKind::Canceled,
            EventKind::Finished
        ]
    );
}
