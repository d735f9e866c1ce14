mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{admin, user, FakeIdentityProvider};
use glory_app_core::{
    AuthRecheck, DomainEvent, FilePersistence, FlagKey, FlagStore, GlorySettings, IdentityGate,
    IdentitySource, LifecycleSignal, ManualClock, SessionGuard, SessionState, UnloadDecision,
};
use tokio::sync::mpsc;

fn signed_in_flags() -> FlagStore {
    let flags = FlagStore::in_memory();
    flags.raise(FlagKey::AuthCache).unwrap();
    flags
        .set(
            FlagKey::AuthIdentity,
            r#"{"user_id":"u1","email":"u1@example.com"}"#,
        )
        .unwrap();
    flags.set(FlagKey::CurrentDraftId, "cv-1").unwrap();
    flags
}

fn guard(flags: &FlagStore, clock: &Arc<ManualClock>) -> (SessionGuard, Arc<FakeIdentityProvider>) {
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    let guard = SessionGuard::new(flags.clone(), provider.clone(), clock.clone());
    (guard, provider)
}

#[tokio::test]
async fn unload_right_after_navigation_keeps_the_session() {
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(50_000));
    let (mut guard, provider) = guard(&flags, &clock);

    guard.mark_navigation();
    clock.advance(500);

    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::BeforeUnload),
        UnloadDecision::Navigation
    );
    assert!(flags.get_raw(FlagKey::AuthCache).unwrap().is_some());
    assert!(matches!(guard.state(), SessionState::RecentNavigation { .. }));
    tokio::task::yield_now().await;
    assert_eq!(provider.sign_outs(), 0);
}

#[tokio::test]
async fn unload_long_after_navigation_signs_out() {
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(50_000));
    let (mut guard, provider) = guard(&flags, &clock);

    guard.mark_navigation();
    clock.advance(2_000);

    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::PageHide),
        UnloadDecision::SignedOut
    );
    assert!(flags.get_raw(FlagKey::AuthCache).unwrap().is_none());
    assert!(flags.get_raw(FlagKey::AuthIdentity).unwrap().is_none());
    assert!(flags.get_raw(FlagKey::CurrentDraftId).unwrap().is_none());
    assert_eq!(guard.state(), SessionState::LoggedOut);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(provider.sign_outs(), 1);
}

#[tokio::test]
async fn logged_out_is_terminal_until_restart() {
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(0));
    let (mut guard, provider) = guard(&flags, &clock);

    guard.on_lifecycle(LifecycleSignal::HiddenAndUnloading);
    guard.mark_reload();
    assert_eq!(guard.state(), SessionState::LoggedOut);
    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::BeforeUnload),
        UnloadDecision::SignedOut
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(provider.sign_outs(), 1);

    guard.restart();
    guard.mark_reload();
    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::BeforeUnload),
        UnloadDecision::Navigation
    );
}

#[tokio::test]
async fn admin_sessions_survive_closing_the_tab() {
    let flags = signed_in_flags();
    flags.raise(FlagKey::AdminAccess).unwrap();
    let clock = Arc::new(ManualClock::at(0));
    let (mut guard, _provider) = guard(&flags, &clock);

    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::PageHide),
        UnloadDecision::AdminPreserved
    );
    assert!(flags.get_raw(FlagKey::AuthCache).unwrap().is_some());

    let mut strict = guard.preserve_admin_sessions(false);
    assert_eq!(
        strict.on_lifecycle(LifecycleSignal::PageHide),
        UnloadDecision::SignedOut
    );
}

#[test]
fn stale_markers_are_dropped_when_the_page_is_shown() {
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(1_000));
    let (guard, _provider) = guard(&flags, &clock);
    let mut guard = guard.with_window_ms(300);

    guard.mark_authenticated();
    clock.advance(100);
    guard.on_page_shown();
    assert!(flags.get_raw(FlagKey::JustAuthenticatedAt).unwrap().is_some());

    clock.advance(300);
    guard.on_page_shown();
    assert!(flags.get_raw(FlagKey::JustAuthenticatedAt).unwrap().is_none());
    assert_eq!(guard.state(), SessionState::Active);
}

#[tokio::test]
async fn slow_provider_falls_back_to_the_cached_identity() {
    let flags = signed_in_flags();
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    provider.set_delay(Duration::from_secs(5));
    let gate = IdentityGate::new(provider, flags).with_timeout(Duration::from_millis(50));

    let check = gate.check().await;
    assert_eq!(check.source, IdentitySource::Cache);
    assert!(check.logged_in);
    assert_eq!(check.identity.map(|i| i.user_id).as_deref(), Some("u1"));
}

#[tokio::test]
async fn bare_login_marker_still_counts_as_logged_in() {
    let flags = FlagStore::in_memory();
    flags.set(FlagKey::AuthCache, "true").unwrap();
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    provider.set_delay(Duration::from_secs(5));
    let settings = GlorySettings {
        identity_timeout_ms: 50,
        ..GlorySettings::default()
    };
    let gate = IdentityGate::from_settings(provider, flags, &settings);

    let check = gate.check().await;
    assert_eq!(check.source, IdentitySource::Cache);
    assert!(check.logged_in);
    assert!(check.identity.is_none());
}

#[tokio::test]
async fn cached_identity_without_the_marker_is_ignored() {
    let flags = signed_in_flags();
    flags.clear(FlagKey::AuthCache).unwrap();
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    provider.set_delay(Duration::from_secs(5));
    let gate = IdentityGate::new(provider, flags).with_timeout(Duration::from_millis(50));

    let check = gate.check().await;
    assert!(!check.logged_in);
    assert!(check.identity.is_none());
}

#[tokio::test]
async fn provider_answer_refreshes_the_cache() {
    let flags = FlagStore::in_memory();
    let provider = FakeIdentityProvider::signed_in(user("u9"));
    let gate = IdentityGate::new(provider, flags.clone());
    let mut rx = gate.subscribe();

    let check = gate.check().await;
    assert_eq!(check.source, IdentitySource::Provider);
    assert!(check.logged_in);
    assert_eq!(flags.get_raw(FlagKey::AuthCache).unwrap().as_deref(), Some("true"));
    assert_eq!(gate.cached().map(|i| i.user_id).as_deref(), Some("u9"));
    assert!(rx.has_changed().unwrap());
    assert_eq!(
        rx.borrow_and_update().as_ref().map(|i| i.user_id.clone()).as_deref(),
        Some("u9")
    );
}

#[tokio::test]
async fn provider_sign_out_clears_the_cache() {
    let flags = signed_in_flags();
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    let gate = IdentityGate::new(provider.clone(), flags.clone());
    gate.check().await;

    let subscription = gate.follow_provider();
    assert_eq!(provider.listener_count(), 1);
    provider.emit(None);
    assert!(gate.current().is_none());
    assert!(flags.get_raw(FlagKey::AuthCache).unwrap().is_none());
    assert!(flags.get_raw(FlagKey::AuthIdentity).unwrap().is_none());

    drop(subscription);
    assert_eq!(provider.listener_count(), 0);
    provider.emit(Some(user("u2")));
    assert!(gate.current().is_none());
}

#[tokio::test]
async fn auth_recheck_fires_once_or_not_at_all() {
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    let gate = Arc::new(IdentityGate::new(provider, FlagStore::in_memory()));

    let settings = GlorySettings {
        auth_recheck_delay_ms: 20,
        ..GlorySettings::default()
    };
    let recheck = AuthRecheck::from_settings(gate.clone(), &settings);
    let check = recheck.finished().await.expect("re-check ran");
    assert_eq!(check.identity.map(|i| i.user_id).as_deref(), Some("u1"));

    let cancelled = AuthRecheck::schedule(gate, Duration::from_secs(5));
    cancelled.cancel();
    assert!(cancelled.finished().await.is_none());
}

#[tokio::test]
async fn saved_settings_can_turn_off_admin_preservation() {
    let tmp = tempfile::tempdir().unwrap();
    let saved = GlorySettings {
        preserve_admin_sessions: false,
        ..GlorySettings::default()
    };
    FilePersistence::in_dir(tmp.path())
        .save_settings(&saved)
        .unwrap();
    let settings = FilePersistence::in_dir(tmp.path()).load_settings().unwrap();

    let flags = signed_in_flags();
    flags.raise(FlagKey::AdminAccess).unwrap();
    let clock = Arc::new(ManualClock::at(0));
    let provider = FakeIdentityProvider::signed_in(admin("a1"));
    let mut guard =
        SessionGuard::from_settings(flags.clone(), provider.clone(), clock, &settings);

    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::PageHide),
        UnloadDecision::SignedOut
    );
    assert!(flags.get_raw(FlagKey::AuthCache).unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(provider.sign_outs(), 1);
}

#[test]
fn saved_window_decides_what_counts_as_navigation() {
    let settings = GlorySettings {
        session_window_ms: 200,
        ..GlorySettings::default()
    };
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(10_000));
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    let mut guard = SessionGuard::from_settings(flags, provider, clock.clone(), &settings);

    guard.mark_reload();
    clock.advance(500);
    assert_eq!(
        guard.on_lifecycle(LifecycleSignal::BeforeUnload),
        UnloadDecision::SignedOut
    );
}

#[test]
fn session_changes_are_reported_as_events() {
    let (tx, mut rx) = mpsc::channel(8);
    let flags = signed_in_flags();
    let clock = Arc::new(ManualClock::at(0));
    let (guard, _provider) = guard(&flags, &clock);
    let mut guard = guard.with_events(tx);

    guard.mark_navigation();
    guard.mark_navigation();
    clock.advance(5_000);
    guard.on_lifecycle(LifecycleSignal::PageHide);

    let mut seen = Vec::new();
    while let Ok(DomainEvent::SessionChanged(state)) = rx.try_recv() {
        seen.push(state);
    }
    assert_eq!(
        seen,
        vec![
            SessionState::RecentNavigation {
                expires_at_ms: glory_config::SESSION_NAVIGATION_WINDOW_MS
            },
            SessionState::LoggedOut,
        ]
    );
}

#[tokio::test]
async fn identity_changes_are_reported_as_events() {
    let (tx, mut rx) = mpsc::channel(8);
    let provider = FakeIdentityProvider::signed_in(user("u1"));
    let gate = IdentityGate::new(provider.clone(), FlagStore::in_memory()).with_events(tx);
    let _subscription = gate.follow_provider();

    gate.check().await;
    gate.check().await;
    provider.emit(None);

    let first = rx.try_recv().unwrap();
    assert!(matches!(
        first,
        DomainEvent::IdentityChanged(Some(ref i)) if i.user_id == "u1"
    ));
    assert!(matches!(rx.try_recv().unwrap(), DomainEvent::IdentityChanged(None)));
    assert!(rx.try_recv().is_err());
}
