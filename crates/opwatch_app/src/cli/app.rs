use std::sync::Arc;

use opwatch_core::{JobKind, ObserverConfig, ObserverView, OperationStatus};
use opwatch_engine::{ApiError, ControlAction, NotificationSink, ServiceClient};
use opwatch_logging::{op_debug, op_info};
use thiserror::Error;

use super::notify::{describe_failure, TerminalNotificationSink};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid base_url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to start runtime: {0}")]
    Io(#[from] std::io::Error),
}

/// Prints one fresh status line per job kind. Both polls run concurrently.
pub(crate) async fn print_status(client: &ServiceClient) {
    let (scan, dedupe) = tokio::join!(
        client.refresh_now(JobKind::Scan),
        client.refresh_now(JobKind::Dedupe)
    );
    println!("{}", status_line(JobKind::Scan, scan.as_ref()));
    println!("{}", status_line(JobKind::Dedupe, dedupe.as_ref()));
}

/// Mounts a terminal observer and prints every view change until ctrl-c.
pub(crate) async fn watch(client: &ServiceClient, notify: bool) {
    let config = if notify {
        ObserverConfig::notifying("terminal")
    } else {
        ObserverConfig::silent("terminal")
    };
    let sink: Option<Arc<dyn NotificationSink>> = Some(Arc::new(TerminalNotificationSink));
    let observer = client.mount_observer(config.with_refresh_on_mount(), sink);
    let mut views = observer.views();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_line = String::new();
    loop {
        let line = view_line(&views.borrow_and_update());
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        tokio::select! {
            _ = &mut shutdown => {
                op_info!("interrupted; unmounting {}", observer.name());
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    observer.unmount();
}

/// Runs a control action and reports the outcome. Returns `false` on failure.
pub(crate) async fn control(client: &ServiceClient, kind: JobKind, action: ControlAction) -> bool {
    op_debug!("requesting {} {}", kind, action);
    match client.control(kind, action, None).await {
        Ok(_) => {
            println!("{} {}: accepted", kind.label(), action);
            println!("{}", status_line(kind, client.status(kind).as_ref()));
            true
        }
        Err(err) => {
            eprintln!("{} {} failed: {}", kind.label(), action, describe_failure(&err));
            false
        }
    }
}

fn status_line(kind: JobKind, status: Option<&OperationStatus>) -> String {
    let Some(status) = status else {
        return format!("{:<14} unknown", kind.label());
    };
    if !status.active {
        return match &status.error {
            Some(error) if status.has_error() => format!("{:<14} idle (last error: {error})", kind.label()),
            _ => format!("{:<14} idle", kind.label()),
        };
    }

    let state = if status.paused { "paused" } else { "running" };
    let mut line = format!("{:<14} {state}", kind.label());
    if let Some(phase) = status.phase {
        line.push_str(&format!(" [{}]", phase.label()));
    }
    if status.progress.total > 0 {
        line.push_str(&format!(" {}/{}", status.progress.done, status.progress.total));
    }
    if let Some(fraction) = status.fraction() {
        line.push_str(&format!(" {:.0}%", fraction * 100.0));
    }
    line
}

fn view_line(view: &ObserverView) -> String {
    match view.fraction {
        Some(fraction) if view.any_active => format!("{} ({:.0}%)", view.headline, fraction * 100.0),
        _ => view.headline.clone(),
    }
}
