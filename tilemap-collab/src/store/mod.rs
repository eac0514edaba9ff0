//! Contract of the shared key/value store every session synchronizes through.
//!
//! ```text
//! ┌───────────┐  update(patch)   ┌──────────────┐  listen(path)  ┌───────────┐
//! │ Session A │ ───────────────► │ SharedStore  │ ─────────────► │ Session B │
//! └───────────┘                  │ (hierarchy)  │  full snapshot └───────────┘
//!                                └──────────────┘  on every change
//! ```
//!
//! The store itself is an external collaborator; [`MemoryStore`] is a
//! single-process implementation of the same contract.

pub mod memory;
pub mod path;

pub use memory::{ManualClock, MemoryStore, ServerClock, SystemClock};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

/// Callback receiving the full current value at a listened path.
pub type SnapshotFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback receiving store failures.
pub type ErrorFn = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Store failures. All of them are transient from the core's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Permission denied at {0}")]
    PermissionDenied(String),
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Placeholder the store replaces with its own clock at write time.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.len() == 1 && m.get(".sv").and_then(Value::as_str) == Some("timestamp"))
}

/// Multi-path write. Each key is a full path whose content is replaced by
/// the value; `null` removes the path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(BTreeMap<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.0.insert(path.into(), value);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) {
        self.0.insert(path.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl IntoIterator for Patch {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Handle to an active listener. Cancelling or dropping it unregisters the
/// listener; no snapshot is delivered afterwards.
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that was never registered (e.g. the listen failed).
    pub fn inactive() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The store contract the core depends on.
pub trait SharedStore: Send + Sync {
    /// Subscribe to the value at `path`. The current value is delivered
    /// right away, then again after every change at, above or below `path`
    /// (`Value::Null` when nothing is stored there).
    fn listen(&self, path: &str, on_snapshot: SnapshotFn, on_error: ErrorFn) -> Subscription;

    /// Apply a multi-path write. Server-time placeholders resolve to the
    /// store's clock. Failures go to `on_error`.
    fn update(&self, patch: Patch, on_error: ErrorFn);
}

impl<S: SharedStore + ?Sized> SharedStore for Arc<S> {
    fn listen(&self, path: &str, on_snapshot: SnapshotFn, on_error: ErrorFn) -> Subscription {
        (**self).listen(path, on_snapshot, on_error)
    }

    fn update(&self, patch: Patch, on_error: ErrorFn) {
        (**self).update(patch, on_error)
    }
}

/// Error callback that only logs.
pub fn log_errors() -> ErrorFn {
    Arc::new(|e: &StoreError| log::warn!("Store error: {e}"))
}
