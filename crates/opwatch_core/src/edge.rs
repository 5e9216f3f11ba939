/// Observable state of one detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    Idle,
    Running,
}

/// Detects the running -> idle edge of one job kind, once per idle period.
///
/// A detector created while the job is already idle never reports an edge for
/// that initial state: `was_active` starts out `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeDetector {
    was_active: bool,
    has_notified: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EdgeState {
        if self.was_active {
            EdgeState::Running
        } else {
            EdgeState::Idle
        }
    }

    pub fn has_notified(&self) -> bool {
        self.has_notified
    }

    /// Feeds the latest `active` flag. Returns `true` exactly on the just-finished edge.
    pub fn observe(&mut self, active: bool) -> bool {
        if active {
            self.was_active = true;
            self.has_notified = false;
            return false;
        }

        if self.was_active && !self.has_notified {
            self.was_active = false;
            self.has_notified = true;
            return true;
        }

        false
    }
}
