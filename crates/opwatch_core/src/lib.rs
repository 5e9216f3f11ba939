//! Opwatch core: pure status model, transition detection and observer state machine.
mod cadence;
mod edge;
mod effect;
mod kind;
mod msg;
mod state;
mod status;
mod update;
mod view_model;

pub use cadence::PollCadence;
pub use edge::{EdgeDetector, EdgeState};
pub use effect::{caches_for, Effect, Notification, NotificationLevel, ViewCache};
pub use kind::{JobKind, PerKind};
pub use msg::Msg;
pub use state::{ObserverConfig, ObserverState};
pub use status::{OperationStatus, Phase, Progress};
pub use update::update;
pub use view_model::ObserverView;
