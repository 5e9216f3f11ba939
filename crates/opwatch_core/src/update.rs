use crate::{caches_for, Effect, Msg, Notification, ObserverState, ViewCache};

/// Pure update function: applies a message to observer state and returns any effects.
pub fn update(mut state: ObserverState, msg: Msg) -> (ObserverState, Vec<Effect>) {
    let effects = match msg {
        Msg::Mounted => {
            // The mount refresh is an explicit step, not an edge: an idle job
            // at mount time must not look like a completion.
            if state.mark_mounted() && state.config().refresh_on_mount {
                ViewCache::ALL.iter().copied().map(Effect::Invalidate).collect()
            } else {
                Vec::new()
            }
        }
        Msg::Snapshot { status: None, .. } => Vec::new(),
        Msg::Snapshot {
            kind,
            status: Some(status),
        } => {
            let just_finished = state.observe_edge(kind, status.active);
            let notification =
                (just_finished && state.config().notify).then(|| Notification::completed(kind, &status));
            state.record(kind, status);

            if just_finished {
                let caches = caches_for(kind);
                let mut effects = Vec::with_capacity(caches.len() + usize::from(notification.is_some()));
                effects.extend(caches.iter().copied().map(Effect::Invalidate));
                effects.extend(notification.map(Effect::Notify));
                effects
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}
