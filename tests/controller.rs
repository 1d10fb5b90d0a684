mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use common::{HangingStore, RecordingExecutor, kolkata, key, wait_for_status, wait_until};
use instancevisor::{
    Action, AdmissionPolicy, BackoffPolicy, Config, DesiredState, Event, EventKind, FixedClock,
    JitterPolicy, LogWriter, MemoryStore, ReconcileRequest, RequeuePolicy, RuntimeError,
    Scheduler, SubmitError, Subscribe,
};

/// Config with fast, deterministic timers; re-checks effectively off.
fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(2);
    cfg.requeue = RequeuePolicy {
        base: Duration::from_secs(3600),
        jitter: JitterPolicy::None,
    };
    cfg.retry = BackoffPolicy {
        first: Duration::from_millis(10),
        max: Duration::from_millis(40),
        factor: 2.0,
        jitter: JitterPolicy::None,
    };
    cfg
}

fn scheduler(
    cfg: Config,
    store: Arc<MemoryStore>,
    exec: Arc<RecordingExecutor>,
    hour: u32,
) -> Arc<Scheduler> {
    common::init_tracing();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    Scheduler::builder(cfg)
        .with_subscribers(subs)
        .with_clock(Arc::new(FixedClock::new(kolkata(hour, 0, 0))))
        .build(store, exec)
}

fn office_hours() -> DesiredState {
    DesiredState::windowed(Action::Start, ["i-1"], "09:00:00", "18:00:00")
}

#[tokio::test]
async fn applied_trigger_runs_immediate_action_once() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::new();
    let k = key("batch");
    store
        .apply(k.clone(), DesiredState::immediate(Action::Stop, ["a", "b"]))
        .await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 3);
    let handle = sched.handle();

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_for_status(&store, &k, "Immediate/Completed").await);

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(exec.calls(), 1);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn triggers_for_a_busy_key_coalesce_into_one_follow_up() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_millis(150));
    let k = key("office");
    store.apply(k.clone(), office_hours()).await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 12);
    let handle = sched.handle();

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_until(|| exec.calls() == 1).await);
    for _ in 0..5 {
        handle.try_submit(ReconcileRequest::applied(k.clone())).unwrap();
    }

    assert!(wait_until(|| exec.calls() == 2).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(exec.calls(), 2);
    assert_eq!(exec.max_running(), 1, "two passes ran for the same key at once");

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn drop_if_running_ignores_busy_triggers() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_millis(150));
    let k = key("office");
    store.apply(k.clone(), office_hours()).await;

    let mut cfg = fast_config();
    cfg.controller.admission = AdmissionPolicy::DropIfRunning;
    let sched = scheduler(cfg, store.clone(), exec.clone(), 12);
    let mut events = sched.bus().subscribe();
    let handle = sched.handle();

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_until(|| exec.calls() == 1).await);
    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(exec.calls(), 1);

    let mut dropped = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::ReconcileDropped {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 1);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn different_keys_run_concurrently() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_millis(200));
    for name in ["a", "b", "c"] {
        store.apply(key(name), office_hours()).await;
    }

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 12);
    for name in ["a", "b", "c"] {
        sched
            .handle()
            .submit(ReconcileRequest::applied(key(name)))
            .await
            .unwrap();
    }

    assert!(wait_until(|| exec.calls() == 3).await);
    assert!(wait_until(|| exec.max_running() >= 2).await);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn max_concurrent_bounds_passes_across_keys() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_millis(50));
    for name in ["a", "b", "c", "d"] {
        store.apply(key(name), office_hours()).await;
    }

    let mut cfg = fast_config();
    cfg.max_concurrent = 1;
    let sched = scheduler(cfg, store.clone(), exec.clone(), 12);
    for name in ["a", "b", "c", "d"] {
        sched
            .handle()
            .submit(ReconcileRequest::applied(key(name)))
            .await
            .unwrap();
    }

    assert!(wait_until(|| exec.calls() == 4).await);
    assert_eq!(exec.max_running(), 1);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn windowed_objects_are_rechecked() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::new();
    let k = key("office");
    store.apply(k.clone(), office_hours()).await;

    let mut cfg = fast_config();
    cfg.requeue = RequeuePolicy {
        base: Duration::from_millis(30),
        jitter: JitterPolicy::None,
    };
    let sched = scheduler(cfg, store.clone(), exec.clone(), 12);

    sched
        .handle()
        .submit(ReconcileRequest::applied(k.clone()))
        .await
        .unwrap();
    assert!(wait_until(|| exec.calls() >= 3).await);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn retryable_failures_back_off_until_success() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::failing_times(2);
    let k = key("flaky");
    store
        .apply(k.clone(), DesiredState::immediate(Action::Start, ["i-1"]))
        .await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 3);
    let mut events = sched.bus().subscribe();
    sched
        .handle()
        .submit(ReconcileRequest::applied(k.clone()))
        .await
        .unwrap();

    assert!(wait_for_status(&store, &k, "Immediate/Completed").await);
    assert_eq!(exec.calls(), 3);

    let mut attempts = Vec::new();
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::BackoffScheduled {
            attempts.push((ev.attempt, ev.delay_ms));
        }
    }
    assert_eq!(attempts.len(), 2);
    assert_eq!((attempts[0].0, attempts[1].0), (Some(1), Some(2)));
    let (first, second) = (attempts[0].1.unwrap(), attempts[1].1.unwrap());
    assert!((9..=10).contains(&first), "first backoff {first}ms");
    assert!((19..=20).contains(&second), "second backoff {second}ms");

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn configuration_errors_wait_for_a_spec_change() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::new();
    let k = key("broken");
    let mut spec = office_hours();
    spec.window_start = Some("nine".into());
    store.apply(k.clone(), spec).await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 12);
    let mut events = sched.bus().subscribe();
    let handle = sched.handle();

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_for_status(&store, &k, "Windowed/Failed").await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut started = 0;
    while let Ok(ev) = events.try_recv() {
        assert_ne!(ev.kind, EventKind::BackoffScheduled);
        if ev.kind == EventKind::ReconcileStarted {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(exec.calls(), 0);

    // Fixing the spec brings the object back.
    store.apply(k.clone(), office_hours()).await;
    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_for_status(&store, &k, "Windowed/InWindow").await);
    assert_eq!(exec.calls(), 1);

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn delete_cancels_the_in_flight_action() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_secs(30));
    let k = key("doomed");
    store
        .apply(k.clone(), DesiredState::immediate(Action::Stop, ["i-1"]))
        .await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 3);
    let handle = sched.handle();

    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_until(|| exec.calls() == 1).await);
    assert_eq!(sched.in_flight().await, vec![k.to_string()]);

    store.delete(&k).await;
    handle.submit(ReconcileRequest::deleted(k.clone())).await.unwrap();

    assert!(wait_until(|| exec.saw_cancel()).await);
    let mut idle = false;
    for _ in 0..100 {
        if sched.in_flight().await.is_empty() {
            idle = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(idle);
    assert!(store.status(&k).await.is_none());

    sched.shutdown();
    sched.run().await.unwrap();
}

#[tokio::test]
async fn shutdown_cancels_in_flight_and_closes_the_queue() {
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::slow(Duration::from_secs(30));
    let k = key("long");
    store
        .apply(k.clone(), DesiredState::immediate(Action::Start, ["i-1"]))
        .await;

    let sched = scheduler(fast_config(), store.clone(), exec.clone(), 3);
    let handle = sched.handle();
    handle.submit(ReconcileRequest::applied(k.clone())).await.unwrap();
    assert!(wait_until(|| exec.calls() == 1).await);

    sched.shutdown();
    sched.run().await.unwrap();

    assert!(exec.saw_cancel());
    // Cancelled before completing: the next run retries.
    assert_eq!(store.status(&k).await.unwrap().label(), "Immediate/Failed");
    assert_eq!(
        handle.submit(ReconcileRequest::applied(k)).await,
        Err(SubmitError::Closed)
    );
}

#[tokio::test]
async fn grace_exceeded_reports_stuck_keys() {
    common::init_tracing();
    let exec = RecordingExecutor::new();
    let mut cfg = fast_config();
    cfg.grace = Duration::from_millis(50);

    let sched = Scheduler::builder(cfg).build(Arc::new(HangingStore), exec);
    let k = key("hung");
    sched
        .handle()
        .submit(ReconcileRequest::applied(k.clone()))
        .await
        .unwrap();

    let mut started = false;
    for _ in 0..100 {
        if !sched.in_flight().await.is_empty() {
            started = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(started);

    sched.shutdown();
    let err = sched.run().await.unwrap_err();
    let RuntimeError::GraceExceeded { stuck, .. } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(stuck, &vec![k.to_string()]);
    assert_eq!(err.as_label(), "runtime_grace_exceeded");
}

/// Subscriber that records event kinds slowly enough to fall behind the bus.
#[derive(Default)]
struct SlowRecorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for SlowRecorder {
    async fn on_event(&self, ev: &Event) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.kinds.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "slow-recorder"
    }
}

#[tokio::test]
async fn subscribers_see_the_final_shutdown_event() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let exec = RecordingExecutor::new();
    let k = key("batch");
    store
        .apply(k.clone(), DesiredState::immediate(Action::Stop, ["i-1"]))
        .await;

    let recorder = Arc::new(SlowRecorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
    let sched = Scheduler::builder(fast_config())
        .with_subscribers(subs)
        .build(store.clone(), exec.clone());
    assert_eq!(sched.subscriber_count(), 1);

    sched
        .handle()
        .submit(ReconcileRequest::applied(k.clone()))
        .await
        .unwrap();
    assert!(wait_for_status(&store, &k, "Immediate/Completed").await);

    sched.shutdown();
    sched.run().await.unwrap();

    let kinds = recorder.kinds.lock().unwrap().clone();
    assert!(kinds.contains(&EventKind::ActionSucceeded));
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
}
