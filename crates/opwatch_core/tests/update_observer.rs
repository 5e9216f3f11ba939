use std::sync::Once;

use opwatch_core::{
    caches_for, update, Effect, JobKind, Msg, NotificationLevel, ObserverConfig, ObserverState,
    OperationStatus, ViewCache,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(opwatch_logging::initialize_for_tests);
}

fn snapshot(kind: JobKind, status: OperationStatus) -> Msg {
    Msg::Snapshot {
        kind,
        status: Some(status),
    }
}

fn feed(state: ObserverState, msgs: Vec<Msg>) -> (ObserverState, Vec<Effect>) {
    msgs.into_iter().fold((state, Vec::new()), |(state, mut all), msg| {
        let (state, effects) = update(state, msg);
        all.extend(effects);
        (state, all)
    })
}

fn invalidations(kind: JobKind) -> Vec<Effect> {
    caches_for(kind).iter().copied().map(Effect::Invalidate).collect()
}

#[test]
fn silent_observer_invalidates_once_per_run() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::silent("duplicates-page"));
    let (_state, effects) = feed(
        state,
        vec![
            snapshot(JobKind::Scan, OperationStatus::idle()),
            snapshot(JobKind::Scan, OperationStatus::running(1, 10)),
            snapshot(JobKind::Scan, OperationStatus::running(5, 10)),
            snapshot(JobKind::Scan, OperationStatus::idle()),
            snapshot(JobKind::Scan, OperationStatus::idle()),
        ],
    );

    assert_eq!(effects, invalidations(JobKind::Scan));
}

#[test]
fn notifying_observer_emits_one_toast_per_edge() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::notifying("header"));
    let finished = OperationStatus {
        duplicates_found: Some(4),
        ..OperationStatus::running(10, 10)
    };
    let finished = OperationStatus {
        active: false,
        ..finished
    };

    let (state, effects) = feed(
        state,
        vec![
            snapshot(JobKind::Scan, OperationStatus::running(3, 10)),
            snapshot(JobKind::Scan, finished.clone()),
            snapshot(JobKind::Scan, finished.clone()),
        ],
    );

    let toasts: Vec<_> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify(note) => Some(note.clone()),
            Effect::Invalidate(_) => None,
        })
        .collect();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, JobKind::Scan);
    assert_eq!(toasts[0].level, NotificationLevel::Success);
    assert_eq!(toasts[0].title, "Scan complete");
    assert_eq!(toasts[0].message, "Processed 10 items, 4 duplicate groups found");

    // A second run re-arms the detector and produces a second toast.
    let (_state, effects) = feed(
        state,
        vec![
            snapshot(JobKind::Scan, OperationStatus::running(0, 5)),
            snapshot(JobKind::Scan, OperationStatus::idle()),
        ],
    );
    assert_eq!(
        effects
            .iter()
            .filter(|effect| matches!(effect, Effect::Notify(_)))
            .count(),
        1
    );
}

#[test]
fn failed_run_produces_warning_toast() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::notifying("header"));
    let failed = OperationStatus {
        error: Some("Plex database locked".to_string()),
        ..OperationStatus::idle()
    };

    let (_state, effects) = feed(
        state,
        vec![
            snapshot(JobKind::Dedupe, OperationStatus::running(1, 2)),
            snapshot(JobKind::Dedupe, failed),
        ],
    );

    let note = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Notify(note) => Some(note.clone()),
            Effect::Invalidate(_) => None,
        })
        .unwrap();
    assert_eq!(note.level, NotificationLevel::Warning);
    assert_eq!(note.title, "Deduplication finished with errors");
    assert_eq!(note.message, "Plex database locked");
}

#[test]
fn kinds_are_tracked_independently() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::silent("stats"));
    let (state, effects) = feed(
        state,
        vec![
            snapshot(JobKind::Scan, OperationStatus::running(1, 3)),
            snapshot(JobKind::Dedupe, OperationStatus::idle()),
            snapshot(JobKind::Dedupe, OperationStatus::idle()),
        ],
    );
    assert!(effects.is_empty());

    let (_state, effects) = update(state, snapshot(JobKind::Scan, OperationStatus::idle()));
    assert_eq!(effects, invalidations(JobKind::Scan));
    assert!(effects.contains(&Effect::Invalidate(ViewCache::ScanProgress)));
    assert!(!effects.contains(&Effect::Invalidate(ViewCache::DedupeProgress)));
}

#[test]
fn mount_refresh_is_explicit_and_happens_once() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::silent("library").with_refresh_on_mount());
    let (state, effects) = update(state, Msg::Mounted);
    assert_eq!(
        effects,
        ViewCache::ALL
            .iter()
            .copied()
            .map(Effect::Invalidate)
            .collect::<Vec<_>>()
    );
    assert!(state.is_mounted());

    let (state, effects) = update(state, Msg::Mounted);
    assert!(effects.is_empty());

    // Idle at mount is an initial state, not a completion.
    let (_state, effects) = update(state, snapshot(JobKind::Scan, OperationStatus::idle()));
    assert!(effects.is_empty());
}

#[test]
fn mount_without_refresh_is_silent() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::notifying("header"));
    let (_state, effects) = update(state, Msg::Mounted);
    assert!(effects.is_empty());
}

#[test]
fn unknown_snapshot_keeps_previous_view() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::silent("header"));
    let (mut state, _) = update(state, snapshot(JobKind::Scan, OperationStatus::running(2, 4)));
    assert!(state.consume_dirty());

    let (mut state, effects) = update(
        state,
        Msg::Snapshot {
            kind: JobKind::Scan,
            status: None,
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert_eq!(state.latest(JobKind::Scan), Some(&OperationStatus::running(2, 4)));
}

#[test]
fn identical_snapshot_does_not_mark_dirty() {
    init_logging();
    let state = ObserverState::new(ObserverConfig::silent("header"));
    let (mut state, _) = update(state, snapshot(JobKind::Dedupe, OperationStatus::running(1, 9)));
    assert!(state.consume_dirty());

    let (mut state, _) = update(state, snapshot(JobKind::Dedupe, OperationStatus::running(1, 9)));
    assert!(!state.consume_dirty());
}
