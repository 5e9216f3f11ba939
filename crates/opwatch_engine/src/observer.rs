use std::fmt;

use opwatch_core::{update, JobKind, Msg, ObserverConfig, ObserverState, ObserverView, OperationStatus};
use opwatch_logging::{op_debug, op_trace};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{SharedPoller, SideEffectDispatcher, Subscription};

/// One mounted consumer of both status streams.
///
/// Owns its own edge detectors, so every mounted observer invalidates its caches
/// independently; only observers configured to notify emit messages.
pub struct Observer {
    name: String,
    view: watch::Receiver<ObserverView>,
    // Held for their drop side effect: detaching from the poller.
    _subscriptions: [Subscription; 2],
    task: JoinHandle<()>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("name", &self.name).finish()
    }
}

impl Observer {
    /// Mounts an observer. Must be called from within a tokio runtime.
    pub fn mount(poller: &SharedPoller, dispatcher: SideEffectDispatcher, config: ObserverConfig) -> Self {
        let name = config.name.clone();
        let scan = poller.subscribe(JobKind::Scan);
        let dedupe = poller.subscribe(JobKind::Dedupe);
        let state = ObserverState::new(config);
        let (view_tx, view) = watch::channel(state.view());

        let task = tokio::spawn(run_observer(
            state,
            scan.receiver(),
            dedupe.receiver(),
            dispatcher,
            view_tx,
        ));
        op_debug!("mounted observer {}", name);

        Self {
            name,
            view,
            _subscriptions: [scan, dedupe],
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest merged view of both streams.
    pub fn view(&self) -> ObserverView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes whenever the merged view changes.
    pub fn views(&self) -> watch::Receiver<ObserverView> {
        self.view.clone()
    }

    /// Detaches this observer; equivalent to dropping it.
    pub fn unmount(self) {}
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.task.abort();
        op_debug!("unmounted observer {}", self.name);
    }
}

type SnapshotRx = watch::Receiver<Option<OperationStatus>>;

async fn run_observer(
    state: ObserverState,
    mut scan: SnapshotRx,
    mut dedupe: SnapshotRx,
    dispatcher: SideEffectDispatcher,
    view_tx: watch::Sender<ObserverView>,
) {
    let name = state.config().name.clone();
    let mut state = apply(state, Msg::Mounted, &name, &dispatcher, &view_tx);

    // Seed with whatever the poller already knows; a job already idle here is
    // an initial state and produces no edge.
    let seed_scan = scan.borrow_and_update().clone();
    state = apply(
        state,
        Msg::Snapshot {
            kind: JobKind::Scan,
            status: seed_scan,
        },
        &name,
        &dispatcher,
        &view_tx,
    );
    let seed_dedupe = dedupe.borrow_and_update().clone();
    state = apply(
        state,
        Msg::Snapshot {
            kind: JobKind::Dedupe,
            status: seed_dedupe,
        },
        &name,
        &dispatcher,
        &view_tx,
    );

    loop {
        let msg = tokio::select! {
            changed = scan.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = scan.borrow_and_update().clone();
                Msg::Snapshot { kind: JobKind::Scan, status }
            }
            changed = dedupe.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = dedupe.borrow_and_update().clone();
                Msg::Snapshot { kind: JobKind::Dedupe, status }
            }
        };
        state = apply(state, msg, &name, &dispatcher, &view_tx);
    }
}

fn apply(
    state: ObserverState,
    msg: Msg,
    name: &str,
    dispatcher: &SideEffectDispatcher,
    view_tx: &watch::Sender<ObserverView>,
) -> ObserverState {
    op_trace!("{} <- {:?}", name, msg);
    let (mut state, effects) = update(state, msg);
    dispatcher.dispatch(name, effects);
    if state.consume_dirty() {
        view_tx.send_replace(state.view());
    }
    state
}
