use crate::{JobKind, OperationStatus};

/// Named view caches owned by the pages that render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewCache {
    Duplicates,
    LibraryStats,
    ScanHistory,
    ScanProgress,
    DedupeProgress,
}

impl ViewCache {
    pub const ALL: [ViewCache; 5] = [
        ViewCache::Duplicates,
        ViewCache::LibraryStats,
        ViewCache::ScanHistory,
        ViewCache::ScanProgress,
        ViewCache::DedupeProgress,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ViewCache::Duplicates => "duplicates",
            ViewCache::LibraryStats => "library-stats",
            ViewCache::ScanHistory => "scan-history",
            ViewCache::ScanProgress => "scan-progress",
            ViewCache::DedupeProgress => "dedupe-progress",
        }
    }
}

/// Caches made stale when a job of `kind` finishes.
pub fn caches_for(kind: JobKind) -> &'static [ViewCache] {
    match kind {
        JobKind::Scan => &[
            ViewCache::Duplicates,
            ViewCache::LibraryStats,
            ViewCache::ScanHistory,
            ViewCache::ScanProgress,
        ],
        JobKind::Dedupe => &[
            ViewCache::Duplicates,
            ViewCache::LibraryStats,
            ViewCache::ScanHistory,
            ViewCache::DedupeProgress,
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
}

/// A one-shot user-facing message (a toast in the web panel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: JobKind,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    /// Builds the completion message from the first idle snapshot after a run.
    pub fn completed(kind: JobKind, status: &OperationStatus) -> Self {
        if status.has_error() {
            return Self {
                kind,
                level: NotificationLevel::Warning,
                title: format!("{} finished with errors", kind.label()),
                message: status.error.clone().unwrap_or_default(),
            };
        }

        let message = match kind {
            JobKind::Scan => match status.duplicates_found {
                Some(found) => format!(
                    "Processed {} items, {} duplicate groups found",
                    status.progress.done, found
                ),
                None => format!("Processed {} items", status.progress.done),
            },
            JobKind::Dedupe => match status.saved_bytes {
                Some(bytes) => format!(
                    "Moved {} duplicates, reclaimed {}",
                    status.progress.done,
                    format_bytes(bytes)
                ),
                None => format!("Moved {} duplicates", status.progress.done),
            },
        };

        Self {
            kind,
            level: NotificationLevel::Success,
            title: format!("{} complete", kind.label()),
            message,
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Side effects requested by the observer state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Invalidate(ViewCache),
    Notify(Notification),
}
