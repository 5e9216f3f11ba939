use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two background operations tracked by the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Scan,
    Dedupe,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Scan, JobKind::Dedupe];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Scan => "scan",
            JobKind::Dedupe => "dedupe",
        }
    }

    /// Human label used in notifications and headlines.
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Scan => "Scan",
            JobKind::Dedupe => "Deduplication",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scan" => Some(JobKind::Scan),
            "dedupe" | "dedup" => Some(JobKind::Dedupe),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair of values, one per job kind. The two kinds never share state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PerKind<T> {
    pub scan: T,
    pub dedupe: T,
}

impl<T> PerKind<T> {
    pub fn new(scan: T, dedupe: T) -> Self {
        Self { scan, dedupe }
    }

    pub fn get(&self, kind: JobKind) -> &T {
        match kind {
            JobKind::Scan => &self.scan,
            JobKind::Dedupe => &self.dedupe,
        }
    }

    pub fn get_mut(&mut self, kind: JobKind) -> &mut T {
        match kind {
            JobKind::Scan => &mut self.scan,
            JobKind::Dedupe => &mut self.dedupe,
        }
    }
}
