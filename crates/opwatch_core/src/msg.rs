#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The observer was attached to the poller.
    Mounted,
    /// Latest snapshot for a job kind; `None` while nothing has been fetched yet.
    Snapshot {
        kind: crate::JobKind,
        status: Option<crate::OperationStatus>,
    },
}
