use opwatch_core::{JobKind, OperationStatus};
use opwatch_logging::op_warn;

use crate::RequestExecutor;

/// Typed read accessor for one job kind's status.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Latest snapshot, or `None` when the status is unknown this cycle.
    ///
    /// Implementations must not substitute an idle snapshot for a failed read.
    async fn fetch_status(&self) -> Option<OperationStatus>;
}

/// Status source bound to one backend endpoint. Holds no cache of its own.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    kind: JobKind,
    endpoint: String,
    executor: RequestExecutor,
}

impl HttpStatusSource {
    pub fn new(kind: JobKind, endpoint: impl Into<String>, executor: RequestExecutor) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            executor,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl StatusSource for HttpStatusSource {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn fetch_status(&self) -> Option<OperationStatus> {
        match self
            .executor
            .get_json::<OperationStatus>(&self.endpoint, None)
            .await
        {
            Ok(status) => Some(status),
            Err(err) => {
                op_warn!("{} status unknown this cycle: {}", self.kind, err);
                None
            }
        }
    }
}
