#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use opwatch_core::{JobKind, Notification, OperationStatus, PollCadence};
use opwatch_engine::{NotificationSink, SharedPoller, StatusSource};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(opwatch_logging::initialize_for_tests);
}

/// Status source that replays a fixed script and records call concurrency.
///
/// Once the script is exhausted the last entry repeats.
pub struct ScriptedSource {
    kind: JobKind,
    latency: Duration,
    script: Mutex<VecDeque<Option<OperationStatus>>>,
    last: Mutex<Option<OperationStatus>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(kind: JobKind, script: Vec<Option<OperationStatus>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            latency,
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn idle(kind: JobKind) -> Arc<Self> {
        Self::new(kind, vec![Some(OperationStatus::idle())], Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedSource {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn fetch_status(&self) -> Option<OperationStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match script.pop_front() {
                Some(entry) => {
                    if script.is_empty() {
                        *last = entry.clone();
                    }
                    entry
                }
                None => last.clone(),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next
    }
}

pub fn poller_with(scan: Arc<ScriptedSource>, dedupe: Arc<ScriptedSource>) -> SharedPoller {
    SharedPoller::new(scan, dedupe, PollCadence::default())
}

#[derive(Default)]
pub struct RecordingSink {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn taken(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.notes.lock().unwrap().push(notification.clone());
    }
}

pub fn running(done: u64, total: u64) -> Option<OperationStatus> {
    Some(OperationStatus::running(done, total))
}

pub fn idle() -> Option<OperationStatus> {
    Some(OperationStatus::idle())
}
