//! Cursor presence: who is looking at which part of a world.
//!
//! ## Architecture
//!
//! ```text
//! Local navigation / pointer move
//!       │
//!       ▼
//! PresenceEngine::publish()          (no batching; callers rate-limit)
//!       │  update { cursors/{world}/{session}: record, tstamp = server time }
//!       ▼
//! SharedStore
//!       │  listen(cursors/{world})   full snapshot on every change
//!       ▼
//! PresenceEngine::subscribe() ──► CursorSnapshot
//!       │
//!       ▼
//! PresenceEngine::render()           self-excluded, stale filtered, faded
//! ```
//!
//! Records are never deleted. A session that stops writing simply goes
//! stale: readers compare its `tstamp` with a reference time derived from
//! the records themselves, so clock skew between clients and the store does
//! not matter.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tilemap_core::clock::{self, Timestamp, SESSION_TIMEOUT};
use tilemap_core::ViewState;

use crate::session::{Identity, SessionId, UserIndex, UserRef};
use crate::store::path::{cursors_path, ensure_segments};
use crate::store::{path, server_timestamp, ErrorFn, Patch, SharedStore, StoreError, Subscription};

// ───────────────────────────────────────────────────────────────────
// Core types
// ───────────────────────────────────────────────────────────────────

/// Visible area of a session, in tile units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Area covered by an editor of `width_px` × `height_px` pixels
    /// showing `view`.
    pub fn from_view(view: &ViewState, width_px: f64, height_px: f64) -> Self {
        Self {
            left: view.x as f64,
            top: view.y as f64,
            width: width_px / view.scale,
            height: height_px / view.scale,
        }
    }

    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            left: self.left * scale,
            top: self.top * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Pointer position in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

impl Pointer {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One session's presence record as stored under
/// `cursors/{worldId}/{sessionId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    pub user: UserRef,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub tstamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_y: Option<f64>,
}

impl CursorRecord {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.left, self.top, self.width, self.height)
    }

    /// Pointer, when both coordinates are present. Zero is a valid
    /// coordinate.
    pub fn pointer(&self) -> Option<Pointer> {
        Some(Pointer::new(self.mouse_x?, self.mouse_y?))
    }
}

/// Every known session's record in one world.
pub type CursorSnapshot = BTreeMap<SessionId, CursorRecord>;

/// Parse a raw store snapshot. Entries that are not valid records are
/// skipped.
pub fn parse_snapshot(value: &Value) -> CursorSnapshot {
    let Some(entries) = value.as_object() else {
        if !value.is_null() {
            log::warn!("Ignoring non-mapping cursor snapshot");
        }
        return CursorSnapshot::new();
    };
    entries
        .iter()
        .filter_map(|(key, raw)| match serde_json::from_value::<CursorRecord>(raw.clone()) {
            Ok(record) => Some((SessionId::from_raw(key.as_str()), record)),
            Err(e) => {
                log::warn!("Skipping malformed cursor record {key}: {e}");
                None
            }
        })
        .collect()
}

/// Maximum `tstamp` across `records`.
pub fn latest_timestamp<'a>(
    records: impl IntoIterator<Item = &'a CursorRecord>,
) -> Option<Timestamp> {
    records.into_iter().map(|r| r.tstamp).max()
}

// ───────────────────────────────────────────────────────────────────
// Configuration
// ───────────────────────────────────────────────────────────────────

/// Which time stale records are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalenessReference {
    /// Newest `tstamp` among the records. Records only go stale once some
    /// other session writes.
    LatestObserved,
    /// Newest `tstamp`, or the caller's server-time estimate when that is
    /// later. Records go stale even when every session has stopped writing.
    #[default]
    LatestOrNow,
}

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub session_timeout: Duration,
    pub staleness_reference: StalenessReference,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            session_timeout: SESSION_TIMEOUT,
            staleness_reference: StalenessReference::default(),
        }
    }
}

impl PresenceConfig {
    /// Short timeout for tests.
    pub fn for_testing() -> Self {
        Self {
            session_timeout: Duration::from_millis(100),
            ..Self::default()
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Render projection
// ───────────────────────────────────────────────────────────────────

/// What a renderer needs to draw one remote cursor, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRenderData {
    pub session: SessionId,
    pub label: String,
    pub rect: Viewport,
    pub opacity: f64,
    pub pointer: Option<Pointer>,
}

/// A user with at least one live session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUser {
    pub user: UserRef,
    pub label: String,
    pub tstamp: Timestamp,
}

// ───────────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────────

/// Publishes this session's cursor and interprets everyone else's.
pub struct PresenceEngine<S> {
    store: Arc<S>,
    session: SessionId,
    config: PresenceConfig,
}

impl<S: SharedStore> PresenceEngine<S> {
    pub fn new(store: Arc<S>, session: SessionId, config: PresenceConfig) -> Self {
        Self { store, session, config }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Overwrite this session's record in `world_id` with a fresh
    /// server timestamp.
    pub fn publish(
        &self,
        user: &UserRef,
        viewport: Viewport,
        world_id: &str,
        pointer: Option<Pointer>,
        on_error: ErrorFn,
    ) {
        if let Err(e) = ensure_segments(&[world_id, self.session.as_str()]) {
            log::debug!("Refusing to publish cursor: {e}");
            on_error(&e);
            return;
        }
        let record = CursorRecord {
            user: user.clone(),
            left: viewport.left,
            top: viewport.top,
            width: viewport.width,
            height: viewport.height,
            tstamp: 0,
            mouse_x: pointer.map(|p| p.x),
            mouse_y: pointer.map(|p| p.y),
        };
        let mut value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                on_error(&StoreError::from(e));
                return;
            }
        };
        value["tstamp"] = server_timestamp();

        log::trace!("Publishing cursor of {} in {world_id}", self.session);
        self.store.update(
            Patch::new().set(path::cursor_path(world_id, self.session.as_str()), value),
            on_error,
        );
    }

    /// Publish as `identity`. Nothing is written while signed out.
    pub fn publish_as(
        &self,
        identity: &Identity,
        viewport: Viewport,
        world_id: &str,
        pointer: Option<Pointer>,
        on_error: ErrorFn,
    ) -> bool {
        match &identity.user {
            Some(user) => {
                self.publish(user, viewport, world_id, pointer, on_error);
                true
            }
            None => false,
        }
    }

    /// Deliver the full record set of `world_id` on every change.
    ///
    /// On a store error `on_error` runs first, then `on_records` receives an
    /// empty snapshot so presence degrades to "nobody else here".
    pub fn subscribe<F>(&self, world_id: &str, on_records: F, on_error: ErrorFn) -> Subscription
    where
        F: Fn(CursorSnapshot) + Send + Sync + 'static,
    {
        if let Err(e) = ensure_segments(&[world_id]) {
            on_error(&e);
            on_records(CursorSnapshot::new());
            return Subscription::inactive();
        }
        let on_records = Arc::new(on_records);
        let deliver = on_records.clone();
        self.store.listen(
            &cursors_path(world_id),
            Arc::new(move |value: &Value| deliver(parse_snapshot(value))),
            Arc::new(move |e: &StoreError| {
                on_error(e);
                on_records(CursorSnapshot::new());
            }),
        )
    }

    /// Time records are measured against, given the newest observed
    /// `tstamp` and an optional server-time estimate.
    pub fn reference_time(
        &self,
        latest: Option<Timestamp>,
        now: Option<Timestamp>,
    ) -> Option<Timestamp> {
        match self.config.staleness_reference {
            StalenessReference::LatestObserved => latest,
            StalenessReference::LatestOrNow => latest.max(now),
        }
    }

    pub fn is_visible(
        &self,
        session_key: &SessionId,
        record: &CursorRecord,
        now: Option<Timestamp>,
        latest: Timestamp,
    ) -> bool {
        if *session_key == self.session {
            return false;
        }
        let reference = self.reference_time(Some(latest), now).unwrap_or(latest);
        !clock::is_expired(clock::elapsed(reference, record.tstamp), self.config.session_timeout)
    }

    /// Linear fade from 1 (just written) to 0 (at expiry).
    pub fn opacity(&self, record: &CursorRecord, reference: Timestamp) -> f64 {
        clock::fade(clock::elapsed(reference, record.tstamp), self.config.session_timeout)
    }

    /// Visible remote cursors projected to pixels at `scale`.
    pub fn render(
        &self,
        snapshot: &CursorSnapshot,
        now: Option<Timestamp>,
        scale: f64,
        users: &UserIndex,
    ) -> Vec<CursorRenderData> {
        let Some(latest) = latest_timestamp(snapshot.values()) else {
            return Vec::new();
        };
        let reference = self.reference_time(Some(latest), now).unwrap_or(latest);

        snapshot
            .iter()
            .filter(|(key, record)| self.is_visible(key, record, now, latest))
            .map(|(key, record)| CursorRenderData {
                session: key.clone(),
                label: users.display_name(&record.user),
                rect: record.viewport().scaled(scale),
                opacity: self.opacity(record, reference),
                pointer: record
                    .pointer()
                    .map(|p| Pointer::new((p.x + 0.5) * scale, (p.y + 0.5) * scale)),
            })
            .collect()
    }

    /// Users with at least one live session, this one included, freshest
    /// first.
    pub fn here_now(
        &self,
        snapshot: &CursorSnapshot,
        now: Option<Timestamp>,
        users: &UserIndex,
    ) -> Vec<ActiveUser> {
        let Some(latest) = latest_timestamp(snapshot.values()) else {
            return Vec::new();
        };
        let reference = self.reference_time(Some(latest), now).unwrap_or(latest);

        let mut freshest: BTreeMap<&UserRef, Timestamp> = BTreeMap::new();
        for record in snapshot.values() {
            let elapsed = clock::elapsed(reference, record.tstamp);
            if clock::is_expired(elapsed, self.config.session_timeout) {
                continue;
            }
            let entry = freshest.entry(&record.user).or_insert(record.tstamp);
            *entry = (*entry).max(record.tstamp);
        }

        let mut active: Vec<ActiveUser> = freshest
            .into_iter()
            .map(|(user, tstamp)| ActiveUser {
                user: user.clone(),
                label: users.display_name(user),
                tstamp,
            })
            .collect();
        active.sort_by(|a, b| b.tstamp.cmp(&a.tstamp).then_with(|| a.user.cmp(&b.user)));
        active
    }
}
