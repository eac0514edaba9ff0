//! In-process [`SharedStore`] over a single JSON tree.
//!
//! Callbacks run synchronously on the writer's thread, after the internal
//! lock has been released, so a callback may itself read or write the store.
//! Empty mappings are pruned after every write: a path holding `{}` reads
//! back as `null`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::{Map, Value};
use tilemap_core::clock::{now_millis, Timestamp};

use super::path::{is_valid_path, segments};
use super::{is_server_timestamp, ErrorFn, Patch, SharedStore, SnapshotFn, StoreError, Subscription};

/// Source of server time for resolving timestamp placeholders.
pub trait ServerClock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock server time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ServerClock for SystemClock {
    fn now(&self) -> Timestamp {
        now_millis()
    }
}

/// Hand-driven server time.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl ServerClock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

struct Listener {
    path: Vec<String>,
    on_snapshot: SnapshotFn,
    on_error: ErrorFn,
}

struct Inner {
    root: Value,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    available: bool,
}

/// Single-process implementation of the store contract.
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn ServerClock>,
}

impl MemoryStore {
    /// Store stamped with wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn ServerClock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: Value::Null,
                listeners: BTreeMap::new(),
                next_listener_id: 0,
                available: true,
            })),
            clock,
        }
    }

    /// Current value at `path` (`Value::Null` when absent).
    pub fn get(&self, path: &str) -> Value {
        let inner = lock(&self.inner);
        value_at(&inner.root, &owned_segments(path)).cloned().unwrap_or(Value::Null)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// While unavailable, every `listen` and `update` fails with
    /// [`StoreError::Unavailable`]. Existing listeners stay registered.
    pub fn set_available(&self, available: bool) {
        lock(&self.inner).available = available;
    }

    /// Cancel every listener, reporting `error` to each of them.
    pub fn fail_listeners(&self, error: StoreError) {
        let failed: Vec<ErrorFn> = {
            let mut inner = lock(&self.inner);
            std::mem::take(&mut inner.listeners)
                .into_values()
                .map(|l| l.on_error)
                .collect()
        };
        log::warn!("Failing {} listeners: {error}", failed.len());
        for on_error in failed {
            on_error(&error);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    fn listen(&self, path: &str, on_snapshot: SnapshotFn, on_error: ErrorFn) -> Subscription {
        if !is_valid_path(path) {
            on_error(&StoreError::InvalidPath(path.to_string()));
            return Subscription::inactive();
        }

        let (id, initial) = {
            let mut inner = lock(&self.inner);
            if !inner.available {
                drop(inner);
                on_error(&StoreError::Unavailable(format!("cannot listen to {path}")));
                return Subscription::inactive();
            }
            let segs = owned_segments(path);
            let initial = value_at(&inner.root, &segs).cloned().unwrap_or(Value::Null);
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.insert(
                id,
                Listener {
                    path: segs,
                    on_snapshot: on_snapshot.clone(),
                    on_error,
                },
            );
            (id, initial)
        };
        log::trace!("Listener {id} registered at {path}");

        on_snapshot(&initial);

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).listeners.remove(&id);
                log::trace!("Listener {id} cancelled");
            }
        })
    }

    fn update(&self, patch: Patch, on_error: ErrorFn) {
        if let Some((bad, _)) = patch.iter().find(|(p, _)| !is_valid_path(p)) {
            on_error(&StoreError::InvalidPath(bad.clone()));
            return;
        }

        let notifications: Vec<(SnapshotFn, Value)> = {
            let mut inner = lock(&self.inner);
            if !inner.available {
                drop(inner);
                on_error(&StoreError::Unavailable("write rejected".to_string()));
                return;
            }

            let now = self.clock.now();
            let mut written: Vec<Vec<String>> = Vec::with_capacity(patch.len());
            for (path, value) in patch {
                let segs = owned_segments(&path);
                set_at(&mut inner.root, &segs, resolve_server_values(value, now));
                written.push(segs);
            }

            inner
                .listeners
                .values()
                .filter(|l| written.iter().any(|w| overlaps(&l.path, w)))
                .map(|l| {
                    let snapshot = value_at(&inner.root, &l.path).cloned().unwrap_or(Value::Null);
                    (l.on_snapshot.clone(), snapshot)
                })
                .collect()
        };

        for (on_snapshot, snapshot) in notifications {
            on_snapshot(&snapshot);
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // A panicking callback never runs under the lock, so a poisoned guard
    // still holds a consistent tree.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn owned_segments(path: &str) -> Vec<String> {
    segments(path).into_iter().map(str::to_string).collect()
}

/// Two paths overlap when one is a prefix of the other.
fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

fn value_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, seg| node.as_object()?.get(seg))
}

/// Replace the content at `path`; `null` removes it. Empty mappings left
/// behind are pruned up to the root.
fn set_at(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        prune(node);
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
        if child.is_null() {
            map.remove(head);
        }
        if map.is_empty() {
            *node = Value::Null;
        }
    }
}

fn prune(node: &mut Value) {
    if let Value::Object(map) = node {
        for child in map.values_mut() {
            prune(child);
        }
        map.retain(|_, v| !v.is_null());
        if map.is_empty() {
            *node = Value::Null;
        }
    }
}

fn resolve_server_values(value: Value, now: Timestamp) -> Value {
    if is_server_timestamp(&value) {
        return Value::from(now);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, resolve_server_values(v, now)))
                .collect(),
        ),
        other => other,
    }
}
