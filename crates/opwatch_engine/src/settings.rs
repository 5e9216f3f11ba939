use std::fmt;
use std::time::Duration;

use opwatch_core::{JobKind, PerKind, PollCadence};
use url::Url;

/// Mutating job-control actions exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Stop,
    Clear,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
            ControlAction::Clear => "clear",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub status: PerKind<String>,
    /// Prefix for control actions; the action name is appended as the last segment.
    pub control: PerKind<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            status: PerKind::new("/api/scan/status".to_string(), "/api/dedupe/status".to_string()),
            control: PerKind::new("/api/scan".to_string(), "/api/dedupe".to_string()),
        }
    }
}

impl Endpoints {
    pub fn status(&self, kind: JobKind) -> &str {
        self.status.get(kind)
    }

    pub fn control(&self, kind: JobKind, action: ControlAction) -> String {
        format!("{}/{}", self.control.get(kind).trim_end_matches('/'), action)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_url: Url,
    /// Deadline applied to every read request, measured from issuance.
    pub read_deadline: Duration,
    pub connect_timeout: Duration,
    pub cadence: PollCadence,
    pub endpoints: Endpoints,
}

impl EngineSettings {
    pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(12);

    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            read_deadline: Self::DEFAULT_READ_DEADLINE,
            connect_timeout: Duration::from_secs(5),
            cadence: PollCadence::default(),
            endpoints: Endpoints::default(),
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, url::ParseError> {
        Url::parse(base_url).map(Self::new)
    }
}
