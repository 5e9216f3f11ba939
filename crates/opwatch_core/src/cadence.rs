use std::time::Duration;

use crate::OperationStatus;

/// Adaptive polling intervals and the freshness grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCadence {
    /// Interval while the last known snapshot reports `active`.
    pub active_interval: Duration,
    /// Interval while idle or while nothing is known yet.
    pub idle_interval: Duration,
    /// A snapshot younger than this is served from cache instead of refetched.
    pub fresh_window: Duration,
}

impl Default for PollCadence {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_millis(1500),
            idle_interval: Duration::from_secs(5),
            fresh_window: Duration::from_secs(1),
        }
    }
}

impl PollCadence {
    pub fn next_delay(&self, last: Option<&OperationStatus>) -> Duration {
        match last {
            Some(status) if status.active => self.active_interval,
            _ => self.idle_interval,
        }
    }

    pub fn is_fresh(&self, age: Duration) -> bool {
        age < self.fresh_window
    }
}
