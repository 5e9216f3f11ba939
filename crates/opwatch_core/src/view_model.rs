use crate::{JobKind, OperationStatus};

/// Presentation-level merge of the two independent status streams.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObserverView {
    pub scan: Option<OperationStatus>,
    pub dedupe: Option<OperationStatus>,
    pub any_active: bool,
    pub headline: String,
    pub fraction: Option<f32>,
    pub dirty: bool,
}

impl ObserverView {
    pub(crate) fn from_snapshots(
        scan: Option<&OperationStatus>,
        dedupe: Option<&OperationStatus>,
        dirty: bool,
    ) -> Self {
        // Dedupe runs are shorter and user initiated; they take the headline.
        let leading = [(JobKind::Dedupe, dedupe), (JobKind::Scan, scan)]
            .into_iter()
            .find_map(|(kind, status)| status.filter(|s| s.active).map(|s| (kind, s)));

        let headline = match leading {
            Some((kind, status)) => running_headline(kind, status),
            None if scan.is_none() && dedupe.is_none() => "Status unknown".to_string(),
            None => "Idle".to_string(),
        };

        Self {
            scan: scan.cloned(),
            dedupe: dedupe.cloned(),
            any_active: leading.is_some(),
            headline,
            fraction: leading.and_then(|(_, status)| status.fraction()),
            dirty,
        }
    }
}

fn running_headline(kind: JobKind, status: &OperationStatus) -> String {
    let mut line = if status.paused {
        format!("{} paused", kind.label())
    } else {
        match status.phase {
            Some(phase) => format!("{} {}", kind.label(), phase.label()),
            None => format!("{} running", kind.label()),
        }
    };
    if status.progress.total > 0 {
        line.push_str(&format!(" {}/{}", status.progress.done, status.progress.total));
    }
    if let Some(item) = status.current_item.as_deref() {
        line.push_str(&format!(" ({item})"));
    }
    line
}
