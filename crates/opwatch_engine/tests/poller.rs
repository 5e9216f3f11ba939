mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{idle, init_logging, poller_with, running, ScriptedSource};
use opwatch_core::{JobKind, OperationStatus, PollCadence};
use opwatch_engine::{SharedPoller, StatusSource};
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn concurrent_polls_never_overlap() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(1, 10)], Duration::from_millis(100));
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));

    // The second forced caller queues one follow-up; the cache reader joins the first poll.
    let (a, b, c, d) = tokio::join!(
        poller.refresh_now(JobKind::Scan),
        poller.refresh_now(JobKind::Scan),
        poller.refresh_now(JobKind::Scan),
        poller.ensure_fresh(JobKind::Scan),
    );

    assert_eq!(scan.calls(), 2);
    assert_eq!(scan.max_in_flight(), 1);
    assert_eq!(a, running(1, 10));
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(c, d);
    assert_eq!(poller.status(JobKind::Scan), running(1, 10));
}

/// Reports whatever the backend state was when the request was issued.
struct BackendSource {
    active: AtomicBool,
    calls: AtomicUsize,
    latency: Duration,
}

impl BackendSource {
    fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            latency,
        })
    }
}

#[async_trait::async_trait]
impl StatusSource for BackendSource {
    fn kind(&self) -> JobKind {
        JobKind::Scan
    }

    async fn fetch_status(&self) -> Option<OperationStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.load(Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Some(OperationStatus {
            active,
            ..OperationStatus::idle()
        })
    }
}

#[tokio::test(start_paused = true)]
async fn refresh_after_state_change_does_not_reuse_an_older_poll() {
    init_logging();
    let backend = BackendSource::new(Duration::from_millis(200));
    let poller = SharedPoller::new(
        backend.clone(),
        ScriptedSource::idle(JobKind::Dedupe),
        PollCadence::default(),
    );

    // The timer's first poll goes out while the job is still idle.
    let _sub = poller.subscribe(JobKind::Scan);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    backend.active.store(true, Ordering::SeqCst);
    let (first, second) = tokio::join!(
        poller.refresh_now(JobKind::Scan),
        poller.refresh_now(JobKind::Scan)
    );

    assert_eq!(first.clone().map(|status| status.active), Some(true));
    assert_eq!(first, second);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(poller.status(JobKind::Scan).map(|status| status.active), Some(true));
}

#[tokio::test(start_paused = true)]
async fn fresh_snapshot_is_served_from_cache() {
    init_logging();
    let scan = ScriptedSource::new(
        JobKind::Scan,
        vec![running(1, 10), running(2, 10)],
        Duration::ZERO,
    );
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));

    assert_eq!(poller.refresh_now(JobKind::Scan).await, running(1, 10));
    tokio::time::advance(Duration::from_millis(300)).await;
    assert_eq!(poller.ensure_fresh(JobKind::Scan).await, running(1, 10));
    assert_eq!(scan.calls(), 1);

    tokio::time::advance(poller.cadence().fresh_window).await;
    assert_eq!(poller.ensure_fresh(JobKind::Scan).await, running(2, 10));
    assert_eq!(scan.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_now_bypasses_the_grace_window() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![idle(), running(0, 3)], Duration::ZERO);
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));

    poller.refresh_now(JobKind::Scan).await;
    let after_start = poller.refresh_now(JobKind::Scan).await;

    assert_eq!(scan.calls(), 2);
    assert_eq!(after_start, running(0, 3));
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_last_known_snapshot() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(4, 8), None], Duration::ZERO);
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));

    poller.refresh_now(JobKind::Scan).await;
    let during_outage = poller.refresh_now(JobKind::Scan).await;

    assert_eq!(during_outage, running(4, 8));
    assert_eq!(poller.status(JobKind::Scan), running(4, 8));
}

#[tokio::test(start_paused = true)]
async fn unknown_status_is_not_reported_as_idle() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![None], Duration::ZERO);
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));

    assert_eq!(poller.refresh_now(JobKind::Scan).await, None);
    assert_eq!(poller.status(JobKind::Scan), None);
}

#[tokio::test(start_paused = true)]
async fn timer_runs_only_while_observed() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(1, 100)], Duration::from_millis(100));
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));
    assert!(!poller.is_polling(JobKind::Scan));

    let first = poller.subscribe(JobKind::Scan);
    assert!(poller.is_polling(JobKind::Scan));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scan.calls(), 1);
    assert_eq!(first.current(), running(1, 100));

    // Joining is free: no new timer, no extra fetch.
    let second = poller.subscribe(JobKind::Scan);
    assert_eq!(poller.observer_count(JobKind::Scan), 2);
    assert_eq!(second.current(), running(1, 100));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scan.calls(), 1);

    drop(first);
    assert!(poller.is_polling(JobKind::Scan));
    drop(second);
    assert!(!poller.is_polling(JobKind::Scan));
    assert_eq!(poller.observer_count(JobKind::Scan), 0);

    let calls = scan.calls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(scan.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn cadence_adapts_to_activity() {
    init_logging();
    // Default cadence: 1.5 s while active, 5 s while idle.
    let scan = ScriptedSource::new(
        JobKind::Scan,
        vec![running(1, 3), running(2, 3), idle()],
        Duration::ZERO,
    );
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));
    let _sub = poller.subscribe(JobKind::Scan);

    // Polls at t = 0, 1.5 and 3.0; the next one is not due before t = 8.0.
    tokio::time::sleep(Duration::from_millis(3200)).await;
    assert_eq!(scan.calls(), 3);
    tokio::time::sleep(Duration::from_millis(4600)).await;
    assert_eq!(scan.calls(), 3);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(scan.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn kinds_poll_independently() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(1, 2)], Duration::from_millis(50));
    let dedupe = ScriptedSource::new(JobKind::Dedupe, vec![idle()], Duration::from_millis(50));
    let poller = poller_with(scan.clone(), dedupe.clone());

    let (s, d) = tokio::join!(
        poller.refresh_now(JobKind::Scan),
        poller.refresh_now(JobKind::Dedupe)
    );
    assert_eq!(s, running(1, 2));
    assert_eq!(d, idle());
    assert_eq!((scan.calls(), dedupe.calls()), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn just_finished_handlers_fire_once_per_run() {
    init_logging();
    let scan = ScriptedSource::new(
        JobKind::Scan,
        vec![idle(), running(1, 2), running(2, 2), idle(), idle(), running(0, 1), idle()],
        Duration::ZERO,
    );
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    poller.on_just_finished(JobKind::Scan, move |status: &OperationStatus| {
        assert!(!status.active);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut edges_seen = Vec::new();
    for _ in 0..7 {
        poller.refresh_now(JobKind::Scan).await;
        edges_seen.push(fired.load(Ordering::SeqCst));
    }

    assert_eq!(edges_seen, vec![0, 0, 0, 1, 1, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn removed_handler_is_not_called() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(1, 1), idle()], Duration::ZERO);
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let id = poller.on_just_finished(JobKind::Scan, move |_: &OperationStatus| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(poller.remove_handler(id));
    assert!(!poller.remove_handler(id));
    poller.refresh_now(JobKind::Scan).await;
    poller.refresh_now(JobKind::Scan).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn handlers_only_see_edges_while_something_polls() {
    init_logging();
    let scan = ScriptedSource::new(JobKind::Scan, vec![running(1, 2), idle()], Duration::ZERO);
    let poller = poller_with(scan.clone(), ScriptedSource::idle(JobKind::Dedupe));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    poller.on_just_finished(JobKind::Scan, move |_: &OperationStatus| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!poller.is_polling(JobKind::Scan));
    assert_eq!(scan.calls(), 0);

    // Polls at t = 0 and 1.5 s see running then idle.
    let _sub = poller.subscribe(JobKind::Scan);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(scan.calls(), 2);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
