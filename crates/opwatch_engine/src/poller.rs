use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use opwatch_core::{EdgeDetector, JobKind, OperationStatus, PerKind, PollCadence};
use opwatch_logging::{op_debug, op_info, op_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::StatusSource;

/// Identifies a registered just-finished handler.
pub type HandlerId = u64;

type EdgeHandler = Arc<dyn Fn(&OperationStatus) + Send + Sync>;
type PollCall = Shared<BoxFuture<'static, Option<OperationStatus>>>;

/// Canonical state for one job kind.
struct Slot {
    source: Arc<dyn StatusSource>,
    snapshot: watch::Sender<Option<OperationStatus>>,
    last_success: Option<Instant>,
    in_flight: Option<PollCall>,
    /// Forced poll queued behind `in_flight`; shared by forced callers until it issues.
    follow_up: Option<PollCall>,
    observers: usize,
    timer: Option<JoinHandle<()>>,
    detector: EdgeDetector,
    handlers: Vec<(HandlerId, EdgeHandler)>,
}

impl Slot {
    fn new(source: Arc<dyn StatusSource>) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            source,
            snapshot,
            last_success: None,
            in_flight: None,
            follow_up: None,
            observers: 0,
            timer: None,
            detector: EdgeDetector::new(),
            handlers: Vec::new(),
        }
    }
}

struct PollerInner {
    cadence: PollCadence,
    slots: Mutex<PerKind<Slot>>,
    next_handler: AtomicU64,
}

/// One status cache per job kind, refreshed on an adaptive timer while observed.
///
/// Observers only ever get read handles; the poller owns every mutation.
#[derive(Clone)]
pub struct SharedPoller {
    inner: Arc<PollerInner>,
}

impl fmt::Debug for SharedPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPoller")
            .field("cadence", &self.inner.cadence)
            .field("scan_observers", &self.observer_count(JobKind::Scan))
            .field("dedupe_observers", &self.observer_count(JobKind::Dedupe))
            .finish()
    }
}

impl SharedPoller {
    pub fn new(
        scan: Arc<dyn StatusSource>,
        dedupe: Arc<dyn StatusSource>,
        cadence: PollCadence,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                cadence,
                slots: Mutex::new(PerKind::new(Slot::new(scan), Slot::new(dedupe))),
                next_handler: AtomicU64::new(1),
            }),
        }
    }

    pub fn cadence(&self) -> PollCadence {
        self.inner.cadence
    }

    /// Latest known snapshot. Never blocks and never issues a request.
    pub fn status(&self, kind: JobKind) -> Option<OperationStatus> {
        self.inner.lock_slots().get(kind).snapshot.borrow().clone()
    }

    pub fn observer_count(&self, kind: JobKind) -> usize {
        self.inner.lock_slots().get(kind).observers
    }

    pub fn is_polling(&self, kind: JobKind) -> bool {
        self.inner.lock_slots().get(kind).timer.is_some()
    }

    /// Attaches an observer. The first observer of a kind starts its timer.
    pub fn subscribe(&self, kind: JobKind) -> Subscription {
        let mut slots = self.inner.lock_slots();
        let slot = slots.get_mut(kind);
        slot.observers += 1;
        let receiver = slot.snapshot.subscribe();
        if slot.timer.is_none() {
            op_info!("starting {} poller", kind);
            slot.timer = Some(tokio::spawn(run_timer(Arc::clone(&self.inner), kind)));
        }

        Subscription {
            kind,
            receiver,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns the cached snapshot when it is within the grace window, else polls.
    pub async fn ensure_fresh(&self, kind: JobKind) -> Option<OperationStatus> {
        PollerInner::poll(&self.inner, kind, false).await
    }

    /// Polls out of band. A poll already pending for this kind is awaited first and
    /// then followed by exactly one new poll, shared by every forced caller that
    /// arrives before it is issued.
    pub async fn refresh_now(&self, kind: JobKind) -> Option<OperationStatus> {
        PollerInner::poll(&self.inner, kind, true).await
    }

    /// Registers a handler invoked once per running -> idle edge of `kind`.
    ///
    /// Registering does not start polling. Edges are only seen while an observer is
    /// subscribed or someone calls `refresh_now`/`ensure_fresh`.
    ///
    /// Edges are detected once here for all observers, so a handler fires once per
    /// real completion no matter how many observers are mounted.
    pub fn on_just_finished<F>(&self, kind: JobKind, handler: F) -> HandlerId
    where
        F: Fn(&OperationStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_handler.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_slots()
            .get_mut(kind)
            .handlers
            .push((id, Arc::new(handler)));
        id
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut slots = self.inner.lock_slots();
        JobKind::ALL.iter().any(|&kind| {
            let handlers = &mut slots.get_mut(kind).handlers;
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            handlers.len() != before
        })
    }
}

impl PollerInner {
    fn lock_slots(&self) -> MutexGuard<'_, PerKind<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn poll(inner: &Arc<PollerInner>, kind: JobKind, force: bool) -> Option<OperationStatus> {
        let call = {
            let mut slots = inner.lock_slots();
            let slot = slots.get_mut(kind);

            let fresh = slot
                .last_success
                .is_some_and(|at| inner.cadence.is_fresh(at.elapsed()));
            if fresh && !force {
                return slot.snapshot.borrow().clone();
            }

            match (&slot.in_flight, force) {
                (Some(pending), true) => match &slot.follow_up {
                    Some(follow_up) => {
                        op_debug!("joining queued forced {} poll", kind);
                        follow_up.clone()
                    }
                    None => {
                        op_debug!("queueing forced {} poll behind the pending one", kind);
                        let follow_up = Self::start_follow_up(inner, kind, pending.clone());
                        slot.follow_up = Some(follow_up.clone());
                        follow_up
                    }
                },
                (Some(pending), false) => {
                    op_debug!("joining pending {} poll", kind);
                    pending.clone()
                }
                (None, _) => {
                    let call = Self::start_poll(inner, kind, Arc::clone(&slot.source));
                    slot.in_flight = Some(call.clone());
                    call
                }
            }
        };

        match call.await {
            Some(status) => Some(status),
            None => inner.lock_slots().get(kind).snapshot.borrow().clone(),
        }
    }

    /// Spawns the fetch so it settles even when every waiter has gone away.
    fn start_poll(inner: &Arc<PollerInner>, kind: JobKind, source: Arc<dyn StatusSource>) -> PollCall {
        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            let fetched = source.fetch_status().await;
            task_inner.settle(kind, fetched.clone());
            fetched
        });

        handle
            .map(move |joined| match joined {
                Ok(fetched) => fetched,
                Err(err) => {
                    op_warn!("{} poll task failed: {}", kind, err);
                    None
                }
            })
            .boxed()
            .shared()
    }

    /// Waits for `pending` to settle, then issues a poll that starts after the caller asked.
    ///
    /// The pending poll may predate a state change the caller just made, so joining it
    /// could return a stale snapshot. Polls stay sequential per kind.
    fn start_follow_up(inner: &Arc<PollerInner>, kind: JobKind, pending: PollCall) -> PollCall {
        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            pending.await;
            let call = {
                let mut slots = task_inner.lock_slots();
                let slot = slots.get_mut(kind);
                slot.follow_up = None;
                // `pending` cleared itself on settle; anything here was issued after it.
                match &slot.in_flight {
                    Some(call) => call.clone(),
                    None => {
                        let call = Self::start_poll(&task_inner, kind, Arc::clone(&slot.source));
                        slot.in_flight = Some(call.clone());
                        call
                    }
                }
            };
            call.await
        });

        handle
            .map(move |joined| match joined {
                Ok(fetched) => fetched,
                Err(err) => {
                    op_warn!("forced {} poll task failed: {}", kind, err);
                    None
                }
            })
            .boxed()
            .shared()
    }

    /// Publishes a poll result and runs edge handlers outside the lock.
    fn settle(&self, kind: JobKind, fetched: Option<OperationStatus>) {
        let (status, handlers) = {
            let mut slots = self.lock_slots();
            let slot = slots.get_mut(kind);
            slot.in_flight = None;

            // Failed reads keep the last known snapshot on display.
            let Some(status) = fetched else {
                return;
            };
            slot.last_success = Some(Instant::now());
            let just_finished = slot.detector.observe(status.active);
            slot.snapshot.send_if_modified(|current| {
                if current.as_ref() == Some(&status) {
                    false
                } else {
                    *current = Some(status.clone());
                    true
                }
            });

            if !just_finished {
                return;
            }
            op_info!("{} just finished", kind);
            let handlers: Vec<EdgeHandler> = slot
                .handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect();
            (status, handlers)
        };

        for handler in handlers {
            handler(&status);
        }
    }

    fn detach(&self, kind: JobKind) {
        let mut slots = self.lock_slots();
        let slot = slots.get_mut(kind);
        slot.observers = slot.observers.saturating_sub(1);
        if slot.observers == 0 {
            if let Some(timer) = slot.timer.take() {
                op_info!("stopping {} poller", kind);
                timer.abort();
            }
        }
    }
}

async fn run_timer(inner: Arc<PollerInner>, kind: JobKind) {
    loop {
        let latest = PollerInner::poll(&inner, kind, false).await;
        let delay = inner.cadence.next_delay(latest.as_ref());
        tokio::time::sleep(delay).await;
    }
}

/// Read handle held by one observer. Dropping it detaches the observer.
pub struct Subscription {
    kind: JobKind,
    receiver: watch::Receiver<Option<OperationStatus>>,
    inner: Arc<PollerInner>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("kind", &self.kind).finish()
    }
}

impl Subscription {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn current(&self) -> Option<OperationStatus> {
        self.receiver.borrow().clone()
    }

    /// A fresh receiver over the same snapshot stream.
    pub fn receiver(&self) -> watch::Receiver<Option<OperationStatus>> {
        self.receiver.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.detach(self.kind);
    }
}
