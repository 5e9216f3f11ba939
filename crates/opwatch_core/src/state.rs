use crate::view_model::ObserverView;
use crate::{EdgeDetector, JobKind, OperationStatus, PerKind};

/// How one observer reacts to completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Name used in logs.
    pub name: String,
    /// Emit a user notification on each completion edge.
    pub notify: bool,
    /// Invalidate every dependent cache once on mount, regardless of job state.
    pub refresh_on_mount: bool,
}

impl ObserverConfig {
    pub fn silent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notify: false,
            refresh_on_mount: false,
        }
    }

    pub fn notifying(name: impl Into<String>) -> Self {
        Self {
            notify: true,
            ..Self::silent(name)
        }
    }

    pub fn with_refresh_on_mount(mut self) -> Self {
        self.refresh_on_mount = true;
        self
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::silent("observer")
    }
}

/// Per-observer state: its own edge detectors and the latest snapshots it has seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObserverState {
    config: ObserverConfig,
    mounted: bool,
    edges: PerKind<EdgeDetector>,
    latest: PerKind<Option<OperationStatus>>,
    dirty: bool,
}

impl ObserverState {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn edge(&self, kind: JobKind) -> &EdgeDetector {
        self.edges.get(kind)
    }

    pub fn latest(&self, kind: JobKind) -> Option<&OperationStatus> {
        self.latest.get(kind).as_ref()
    }

    pub fn view(&self) -> ObserverView {
        ObserverView::from_snapshots(
            self.latest.scan.as_ref(),
            self.latest.dedupe.as_ref(),
            self.dirty,
        )
    }

    /// Returns whether the view changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_mounted(&mut self) -> bool {
        !std::mem::replace(&mut self.mounted, true)
    }

    pub(crate) fn observe_edge(&mut self, kind: JobKind, active: bool) -> bool {
        self.edges.get_mut(kind).observe(active)
    }

    pub(crate) fn record(&mut self, kind: JobKind, status: OperationStatus) {
        let slot = self.latest.get_mut(kind);
        if slot.as_ref() != Some(&status) {
            *slot = Some(status);
            self.dirty = true;
        }
    }
}
