use std::fmt;
use std::sync::Arc;

use opwatch_core::{Effect, Notification, NotificationLevel};
use opwatch_logging::{op_debug, op_info, op_warn};

use crate::ViewCaches;

/// Destination for user-facing completion messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: &Notification) {
        match notification.level {
            NotificationLevel::Success => {
                op_info!("{}: {}", notification.title, notification.message)
            }
            NotificationLevel::Warning => {
                op_warn!("{}: {}", notification.title, notification.message)
            }
        }
    }
}

/// Executes observer effects: cache invalidation and notifications.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    caches: ViewCaches,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl fmt::Debug for SideEffectDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectDispatcher")
            .field("caches", &self.caches)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl SideEffectDispatcher {
    pub fn new(caches: ViewCaches, sink: Option<Arc<dyn NotificationSink>>) -> Self {
        Self { caches, sink }
    }

    pub fn caches(&self) -> &ViewCaches {
        &self.caches
    }

    pub fn dispatch(&self, observer: &str, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Invalidate(cache) => self.caches.invalidate(cache),
                Effect::Notify(notification) => match &self.sink {
                    Some(sink) => {
                        op_info!("{} notifies: {}", observer, notification.title);
                        sink.notify(&notification);
                    }
                    None => {
                        op_debug!("{} has no notification sink; dropping {}", observer, notification.title)
                    }
                },
            }
        }
    }
}
