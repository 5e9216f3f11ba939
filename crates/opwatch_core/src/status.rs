use serde::{Deserialize, Serialize};

/// Coarse phase reported by the backend while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Discovering,
    Analyzing,
    Matching,
    Grouping,
    Moving,
    Finalizing,
    /// Any phase name this client does not know yet.
    #[serde(other)]
    Other,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Discovering => "discovering",
            Phase::Analyzing => "analyzing",
            Phase::Matching => "matching",
            Phase::Grouping => "grouping",
            Phase::Moving => "moving",
            Phase::Finalizing => "finalizing",
            Phase::Other => "working",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub done: u64,
    #[serde(default)]
    pub total: u64,
}

impl Progress {
    /// Completed share in `0.0..=1.0`, or `None` while the total is unknown.
    pub fn fraction(&self) -> Option<f32> {
        if self.total == 0 {
            return None;
        }
        Some((self.done.min(self.total) as f64 / self.total as f64) as f32)
    }
}

/// One immutable status read for a job kind.
///
/// Every poll yields a fresh value; consumers replace their copy wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub active: bool,
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(flatten)]
    pub progress: Progress,
    /// Item currently being processed (artist/album for scans, group for dedupe).
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Duplicate groups found so far.
    #[serde(default)]
    pub duplicates_found: Option<u64>,
    /// Bytes reclaimed by a dedupe run.
    #[serde(default)]
    pub saved_bytes: Option<u64>,
}

impl OperationStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn running(done: u64, total: u64) -> Self {
        Self {
            active: true,
            progress: Progress { done, total },
            ..Self::default()
        }
    }

    pub fn fraction(&self) -> Option<f32> {
        self.progress.fraction()
    }

    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|err| !err.trim().is_empty())
    }
}
