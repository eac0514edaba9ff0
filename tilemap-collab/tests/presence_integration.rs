//! Integration tests for cursor presence across several sessions.
//!
//! Each test shares one `MemoryStore` driven by a `ManualClock` between
//! two or three `PresenceEngine`s, the way separate editor tabs share the
//! real store.

use std::sync::{Arc, Mutex};

use tilemap_collab::{
    CursorSnapshot, ErrorLog, Identity, ManualClock, MemoryStore, Pointer, PresenceConfig,
    PresenceEngine, SessionId, StalenessReference, StoreError, UserIndex, UserProfile, UserRef,
    Viewport,
};
use tilemap_core::clock::SESSION_TIMEOUT;
use tilemap_core::ViewState;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Store with a hand-driven clock starting at `start`.
fn shared_store(start: u64) -> (Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    (Arc::new(MemoryStore::with_clock(clock.clone())), clock)
}

fn engine(store: &Arc<MemoryStore>, session: &str) -> PresenceEngine<MemoryStore> {
    PresenceEngine::new(store.clone(), SessionId::from_raw(session), PresenceConfig::default())
}

/// Subscribe and keep the latest snapshot.
fn watch(
    engine: &PresenceEngine<MemoryStore>,
    world: &str,
    errors: &ErrorLog,
) -> (tilemap_collab::Subscription, Arc<Mutex<CursorSnapshot>>) {
    let latest = Arc::new(Mutex::new(CursorSnapshot::new()));
    let l = latest.clone();
    let sub = engine.subscribe(world, move |snap| *l.lock().unwrap() = snap, errors.sink());
    (sub, latest)
}

fn timeout_ms() -> u64 {
    SESSION_TIMEOUT.as_millis() as u64
}

// ─── Visibility ──────────────────────────────────────────────────

#[test]
fn test_two_sessions_see_each_other_but_not_themselves() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let (_sub_a, seen_by_a) = watch(&a, "w1", &errors);
    let (_sub_b, seen_by_b) = watch(&b, "w1", &errors);

    a.publish(&"ann".into(), Viewport::new(0.0, 0.0, 20.0, 10.0), "w1", None, errors.sink());
    b.publish(&"bob".into(), Viewport::new(5.0, 5.0, 20.0, 10.0), "w1", None, errors.sink());

    let users = UserIndex::new();
    let from_a = a.render(&seen_by_a.lock().unwrap(), None, 32.0, &users);
    let from_b = b.render(&seen_by_b.lock().unwrap(), None, 32.0, &users);
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].label, "bob");
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].label, "ann");
    assert!(errors.is_empty());
}

#[test]
fn test_worlds_are_isolated() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let (_sub, seen_by_b) = watch(&b, "w2", &errors);

    a.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    assert!(seen_by_b.lock().unwrap().is_empty());
}

#[test]
fn test_same_user_in_two_tabs_is_two_sessions() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let tab1 = engine(&store, "tab1");
    let tab2 = engine(&store, "tab2");
    let observer = engine(&store, "obs");
    let (_sub, seen) = watch(&observer, "w1", &errors);

    let ann = UserRef::new("ann@example.com");
    tab1.publish(&ann, Viewport::default(), "w1", None, errors.sink());
    tab2.publish(&ann, Viewport::default(), "w1", None, errors.sink());

    let snapshot = seen.lock().unwrap().clone();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(observer.render(&snapshot, None, 32.0, &UserIndex::new()).len(), 2);
    assert_eq!(observer.here_now(&snapshot, None, &UserIndex::new()).len(), 1);
    // Each tab still sees the other one.
    assert_eq!(tab1.render(&snapshot, None, 32.0, &UserIndex::new()).len(), 1);
}

// ─── Staleness ───────────────────────────────────────────────────

#[test]
fn test_abandoned_session_goes_stale_for_late_joiner() {
    init_logger();
    let (store, clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let (_sub_b, seen_by_b) = watch(&b, "w1", &errors);

    a.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    let at_write = seen_by_b.lock().unwrap().clone();
    assert_eq!(tilemap_collab::latest_timestamp(at_write.values()), Some(1_000));
    assert_eq!(b.render(&at_write, Some(1_000), 32.0, &UserIndex::new()).len(), 1);

    clock.advance(timeout_ms() + 1);
    let now = 1_000 + timeout_ms() + 1;

    let c = engine(&store, "c");
    let (_sub_c, seen_by_c) = watch(&c, "w1", &errors);
    let late = seen_by_c.lock().unwrap().clone();
    assert_eq!(tilemap_collab::latest_timestamp(late.values()), Some(1_000));

    assert!(b.render(&at_write, Some(now), 32.0, &UserIndex::new()).is_empty());
    assert!(c.render(&late, Some(now), 32.0, &UserIndex::new()).is_empty());
}

#[test]
fn test_fresh_write_pushes_older_session_out() {
    init_logger();
    let (store, clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let observer = PresenceEngine::new(
        store.clone(),
        SessionId::from_raw("obs"),
        PresenceConfig {
            staleness_reference: StalenessReference::LatestObserved,
            ..PresenceConfig::default()
        },
    );
    let (_sub, seen) = watch(&observer, "w1", &errors);

    a.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    clock.advance(timeout_ms() / 2);
    b.publish(&"bob".into(), Viewport::default(), "w1", None, errors.sink());

    let rendered = observer.render(&seen.lock().unwrap(), None, 32.0, &UserIndex::new());
    assert_eq!(rendered.len(), 2);
    let ann = rendered.iter().find(|r| r.label == "ann").unwrap();
    assert!((ann.opacity - 0.5).abs() < 1e-9);

    clock.advance(timeout_ms() / 2 + 1);
    b.publish(&"bob".into(), Viewport::default(), "w1", None, errors.sink());
    let rendered = observer.render(&seen.lock().unwrap(), None, 32.0, &UserIndex::new());
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].label, "bob");
}

#[test]
fn test_republish_refreshes_timestamp() {
    init_logger();
    let (store, clock) = shared_store(1_000);
    let a = engine(&store, "a");
    a.publish(&"ann".into(), Viewport::default(), "w1", None, tilemap_collab::log_errors());
    clock.advance(5_000);
    let pointer = Some(Pointer::new(1.0, 1.0));
    a.publish(&"ann".into(), Viewport::default(), "w1", pointer, tilemap_collab::log_errors());
    assert_eq!(store.get("cursors/w1/a/tstamp"), serde_json::json!(6_000));
}

// ─── Identity and rendering ──────────────────────────────────────

#[test]
fn test_publish_follows_sign_in() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let mut identity = Identity::new(SessionId::from_raw("a"));
    let a = engine(&store, "a");
    let view = ViewState::new("w1", 3, 4, 32.0);
    let viewport = Viewport::from_view(&view, 640.0, 480.0);

    assert!(!a.publish_as(&identity, viewport, &view.world_id, None, errors.sink()));
    identity.sign_in("ann@example.com".into());
    assert!(a.publish_as(&identity, viewport, &view.world_id, None, errors.sink()));

    let stored = store.get("cursors/w1/a");
    assert_eq!(stored["user"], "ann@example.com");
    assert_eq!(stored["width"], 20.0);
    assert_eq!(stored["height"], 15.0);
}

#[test]
fn test_render_uses_profile_names() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let (_sub, seen) = watch(&b, "w1", &errors);
    a.publish(
        &"ann@example.com".into(),
        Viewport::new(1.0, 1.0, 2.0, 2.0),
        "w1",
        Some(Pointer::new(0.0, 0.0)),
        errors.sink(),
    );

    let mut users = UserIndex::new();
    users.insert("ann@example.com".into(), UserProfile { name: Some("Ann".into()) });
    let rendered = b.render(&seen.lock().unwrap(), None, 16.0, &users);
    assert_eq!(rendered[0].label, "Ann");
    assert_eq!(rendered[0].rect, Viewport::new(16.0, 16.0, 32.0, 32.0));
    assert_eq!(rendered[0].pointer, Some(Pointer::new(8.0, 8.0)));
}

// ─── Failures ────────────────────────────────────────────────────

#[test]
fn test_outage_degrades_to_no_peers_and_is_logged() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    let b = engine(&store, "b");
    let (_sub, seen) = watch(&b, "w1", &errors);
    a.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    assert_eq!(seen.lock().unwrap().len(), 1);

    store.fail_listeners(StoreError::Unavailable("connection lost".into()));
    assert!(seen.lock().unwrap().is_empty());

    store.set_available(false);
    a.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    assert_eq!(errors.len(), 2);
    assert!(errors.errors().iter().all(|e| matches!(e, StoreError::Unavailable(_))));
}

#[test]
fn test_invalid_world_id_reported() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let a = engine(&store, "a");
    a.publish(&"ann".into(), Viewport::default(), "bad.world", None, errors.sink());
    assert!(matches!(errors.errors()[0], StoreError::InvalidPath(_)));
    assert_eq!(store.get("cursors"), serde_json::Value::Null);
}

#[test]
fn test_world_id_cannot_reach_into_another_record() {
    init_logger();
    let (store, _clock) = shared_store(1_000);
    let errors = ErrorLog::new();
    let victim = engine(&store, "victim");
    let intruder = engine(&store, "x");

    victim.publish(&"ann".into(), Viewport::default(), "w1", None, errors.sink());
    let before = store.get("cursors/w1/victim");
    intruder.publish(&"eve".into(), Viewport::default(), "w1/victim", None, errors.sink());

    assert_eq!(store.get("cursors/w1/victim"), before);
    assert_eq!(errors.errors(), vec![StoreError::InvalidPath("w1/victim".into())]);
}
