//! Opwatch engine: request execution, shared status polling and effect dispatch.
mod caches;
mod dispatcher;
mod error;
mod executor;
mod observer;
mod poller;
mod service;
mod settings;
mod source;

pub use caches::ViewCaches;
pub use dispatcher::{LogNotificationSink, NotificationSink, SideEffectDispatcher};
pub use error::{ApiError, ErrorBody, ErrorDiscriminator};
pub use executor::{ApiBody, RequestExecutor, RequestKey, RequestOptions};
pub use observer::Observer;
pub use poller::{HandlerId, SharedPoller, Subscription};
pub use service::ServiceClient;
pub use settings::{ControlAction, EngineSettings, Endpoints};
pub use source::{HttpStatusSource, StatusSource};
