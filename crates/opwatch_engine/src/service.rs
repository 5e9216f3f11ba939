use std::sync::Arc;

use opwatch_core::{JobKind, ObserverConfig, OperationStatus};
use opwatch_logging::{op_info, op_warn};
use tokio_util::sync::CancellationToken;

use crate::{
    ApiBody, ApiError, ControlAction, EngineSettings, HandlerId, HttpStatusSource, NotificationSink,
    Observer, RequestExecutor, RequestOptions, SharedPoller, SideEffectDispatcher, ViewCaches,
};

/// Entry point for UI surfaces: status reads, observers and job control.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    settings: Arc<EngineSettings>,
    executor: RequestExecutor,
    poller: SharedPoller,
    caches: ViewCaches,
}

impl ServiceClient {
    pub fn new(settings: EngineSettings) -> Result<Self, ApiError> {
        let executor = RequestExecutor::new(&settings)?;
        let source = |kind: JobKind| {
            Arc::new(HttpStatusSource::new(
                kind,
                settings.endpoints.status(kind),
                executor.clone(),
            ))
        };
        let poller = SharedPoller::new(
            source(JobKind::Scan),
            source(JobKind::Dedupe),
            settings.cadence,
        );

        Ok(Self {
            settings: Arc::new(settings),
            executor,
            poller,
            caches: ViewCaches::new(),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn poller(&self) -> &SharedPoller {
        &self.poller
    }

    pub fn caches(&self) -> &ViewCaches {
        &self.caches
    }

    /// Latest known snapshot; never blocks.
    pub fn status(&self, kind: JobKind) -> Option<OperationStatus> {
        self.poller.status(kind)
    }

    pub async fn refresh_now(&self, kind: JobKind) -> Option<OperationStatus> {
        self.poller.refresh_now(kind).await
    }

    pub fn on_just_finished<F>(&self, kind: JobKind, handler: F) -> HandlerId
    where
        F: Fn(&OperationStatus) + Send + Sync + 'static,
    {
        self.poller.on_just_finished(kind, handler)
    }

    /// Mounts an observer whose effects go to this client's caches and `sink`.
    pub fn mount_observer(
        &self,
        config: ObserverConfig,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Observer {
        let dispatcher = SideEffectDispatcher::new(self.caches.clone(), sink);
        Observer::mount(&self.poller, dispatcher, config)
    }

    /// Issues a job-control call. Failures keep their structured body; on success
    /// the job kind is polled immediately so observers see the new state.
    pub async fn control(
        &self,
        kind: JobKind,
        action: ControlAction,
        cancel: Option<CancellationToken>,
    ) -> Result<ApiBody, ApiError> {
        let endpoint = self.settings.endpoints.control(kind, action);
        let mut options = RequestOptions::post(None);
        options.cancel = cancel;

        match self.executor.execute(&endpoint, options).await {
            Ok(body) => {
                op_info!("{} {} accepted", kind, action);
                self.poller.refresh_now(kind).await;
                Ok(body)
            }
            Err(err) => {
                op_warn!("{} {} rejected: {}", kind, action, err);
                Err(err)
            }
        }
    }

    pub async fn start(&self, kind: JobKind) -> Result<ApiBody, ApiError> {
        self.control(kind, ControlAction::Start, None).await
    }

    pub async fn pause(&self, kind: JobKind) -> Result<ApiBody, ApiError> {
        self.control(kind, ControlAction::Pause, None).await
    }

    pub async fn resume(&self, kind: JobKind) -> Result<ApiBody, ApiError> {
        self.control(kind, ControlAction::Resume, None).await
    }

    pub async fn stop(&self, kind: JobKind) -> Result<ApiBody, ApiError> {
        self.control(kind, ControlAction::Stop, None).await
    }

    pub async fn clear(&self, kind: JobKind) -> Result<ApiBody, ApiError> {
        self.control(kind, ControlAction::Clear, None).await
    }
}
