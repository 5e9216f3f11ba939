use chrono::Local;
use opwatch_core::{Notification, NotificationLevel};
use opwatch_engine::{ApiError, ErrorDiscriminator, NotificationSink};

/// Prints completion notifications to stdout, timestamped.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalNotificationSink;

impl NotificationSink for TerminalNotificationSink {
    fn notify(&self, notification: &Notification) {
        println!("{}", render_notification(notification, &timestamp()));
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn render_notification(notification: &Notification, at: &str) -> String {
    let marker = match notification.level {
        NotificationLevel::Success => "done",
        NotificationLevel::Warning => "warn",
    };
    format!(
        "[{at}] {marker}: {}. {}",
        notification.title, notification.message
    )
}

/// Human-readable failure line, with a next step when the backend told us one.
pub(crate) fn describe_failure(err: &ApiError) -> String {
    let hint = match err {
        ApiError::HttpStatus { body, .. } => match body.discriminator() {
            ErrorDiscriminator::MissingConfiguration => {
                Some("connect a media server in the backend settings first")
            }
            ErrorDiscriminator::AiProviderUnusable => {
                Some("the AI provider rejected requests; check its key and quota")
            }
            ErrorDiscriminator::AiConfigurationRequired => {
                Some("configure an AI provider before starting this job")
            }
            ErrorDiscriminator::Message
            | ErrorDiscriminator::Unstructured
            | ErrorDiscriminator::Empty => None,
        },
        ApiError::Timeout { .. } => Some("the backend is slow to answer; try again shortly"),
        ApiError::Network { .. } => Some("is the backend running at the configured base_url?"),
        ApiError::Cancelled { .. }
        | ApiError::DecodeFailure { .. }
        | ApiError::InvalidEndpoint { .. } => None,
    };

    match hint {
        Some(hint) => format!("{err} ({hint})"),
        None => err.to_string(),
    }
}
