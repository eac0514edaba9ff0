//! Per-world tile types, kept current from the store.
//!
//! ```text
//! default_tile_types() ──────────────┐
//!                                    ▼
//! worlds/{w}/tileTypes ──listen──► TileTypeResolver ──► on_change(&EffectiveTileTypes)
//!        ▲
//!        └── TileTypeEditor::set_field()   (patches one field; last write wins)
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tilemap_core::{EffectiveTileTypes, TileType, TileTypeResolver};

use crate::store::path::{
    ensure_segments, parse_tile_key, tile_path, tile_type_field_path, tile_type_path,
    tile_types_path, tiles_path,
};
use crate::store::{ErrorFn, Patch, SharedStore, StoreError, Subscription};

/// Live subscription to one world's tile-type overrides.
///
/// Dropping the feed cancels the store listener.
pub struct TileTypeFeed {
    resolver: Arc<Mutex<TileTypeResolver>>,
    subscription: Subscription,
}

impl TileTypeFeed {
    /// Listen to the overrides of `world_id` and merge each snapshot over
    /// the resolver's defaults. `on_change` receives the recomputed index,
    /// starting with the initial snapshot.
    pub fn subscribe<S, F>(
        store: &S,
        world_id: &str,
        resolver: TileTypeResolver,
        on_change: F,
        on_error: ErrorFn,
    ) -> Self
    where
        S: SharedStore + ?Sized,
        F: Fn(&EffectiveTileTypes) + Send + Sync + 'static,
    {
        let resolver = Arc::new(Mutex::new(resolver));
        if let Err(e) = ensure_segments(&[world_id]) {
            on_error(&e);
            return Self {
                resolver,
                subscription: Subscription::inactive(),
            };
        }
        let shared = resolver.clone();
        let subscription = store.listen(
            &tile_types_path(world_id),
            Arc::new(move |snapshot: &Value| {
                let effective = lock(&shared).set_overrides_value(snapshot).clone();
                on_change(&effective);
            }),
            on_error,
        );
        Self { resolver, subscription }
    }

    /// Current merged index.
    pub fn effective(&self) -> EffectiveTileTypes {
        lock(&self.resolver).effective().clone()
    }

    /// Replace the defaults; the next call to [`effective`](Self::effective)
    /// reflects them.
    pub fn set_defaults(&self, defaults: Map<String, Value>) -> EffectiveTileTypes {
        lock(&self.resolver).set_defaults(defaults).clone()
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn cancel(self) {
        self.subscription.cancel();
    }
}

fn lock(resolver: &Mutex<TileTypeResolver>) -> MutexGuard<'_, TileTypeResolver> {
    resolver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes to one world's tile types and tiles.
pub struct TileTypeEditor<S> {
    store: Arc<S>,
    world_id: String,
}

impl<S: SharedStore> TileTypeEditor<S> {
    pub fn new(store: Arc<S>, world_id: impl Into<String>) -> Self {
        Self {
            store,
            world_id: world_id.into(),
        }
    }

    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    /// Override a single field. Concurrent edits to other fields survive.
    pub fn set_field(&self, tile_type_id: &str, field: &str, value: Value, on_error: ErrorFn) {
        if !self.permits(tile_type_id, &[field], &on_error) {
            return;
        }
        self.store.update(
            Patch::new().set(tile_type_field_path(&self.world_id, tile_type_id, field), value),
            on_error,
        );
    }

    /// Write every attribute of `tile_type` as its own field patch.
    pub fn set_tile_type(&self, tile_type: &TileType, on_error: ErrorFn) {
        let fields = match serde_json::to_value(tile_type) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => Map::new(),
            Err(e) => {
                on_error(&StoreError::from(e));
                return;
            }
        };
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        if !self.permits(&tile_type.id, &names, &on_error) {
            return;
        }
        let patch = fields.into_iter().fold(Patch::new(), |patch, (field, value)| {
            patch.set(tile_type_field_path(&self.world_id, &tile_type.id, &field), value)
        });
        self.store.update(patch, on_error);
    }

    /// Drop the world's override so the default entry shows through again.
    pub fn remove_override(&self, tile_type_id: &str, on_error: ErrorFn) {
        if !self.permits(tile_type_id, &[], &on_error) {
            return;
        }
        self.store.update(
            Patch::new().set(tile_type_path(&self.world_id, tile_type_id), Value::Null),
            on_error,
        );
    }

    /// Paint the tile at `(x, y)`; `None` clears it.
    pub fn paint(&self, x: i64, y: i64, tile_type_id: Option<&str>, on_error: ErrorFn) {
        if let Err(e) = ensure_segments(&[self.world_id.as_str()]) {
            on_error(&e);
            return;
        }
        let value = tile_type_id.map_or(Value::Null, |id| Value::String(id.to_string()));
        self.store.update(Patch::new().set(tile_path(&self.world_id, x, y), value), on_error);
    }

    /// Every id a write splices into a path must be a single segment, and
    /// system types stay read-only.
    fn permits(&self, tile_type_id: &str, fields: &[&str], on_error: &ErrorFn) -> bool {
        let mut segments = vec![self.world_id.as_str(), tile_type_id];
        segments.extend_from_slice(fields);
        if let Err(e) = ensure_segments(&segments) {
            log::debug!("Rejecting tile-type write: {e}");
            on_error(&e);
            return false;
        }
        !refuse_system_type(tile_type_id, on_error)
    }
}

/// Painted tiles of one world, keyed by `(x, y)`.
pub type TileMap = BTreeMap<(i64, i64), String>;

/// Parse a raw `worlds/{w}/tiles` snapshot. Unreadable keys and non-string
/// values are skipped.
pub fn parse_tiles(value: &Value) -> TileMap {
    let Some(entries) = value.as_object() else {
        return TileMap::new();
    };
    entries
        .iter()
        .filter_map(|(key, raw)| {
            let coords = parse_tile_key(key);
            let tile_type = raw.as_str();
            if coords.is_none() || tile_type.is_none() {
                log::warn!("Skipping malformed tile {key}: {raw}");
            }
            Some((coords?, tile_type?.to_string()))
        })
        .collect()
}

/// Deliver the painted tiles of `world_id` on every change.
pub fn subscribe_tiles<S, F>(
    store: &S,
    world_id: &str,
    on_tiles: F,
    on_error: ErrorFn,
) -> Subscription
where
    S: SharedStore + ?Sized,
    F: Fn(TileMap) + Send + Sync + 'static,
{
    if let Err(e) = ensure_segments(&[world_id]) {
        on_error(&e);
        return Subscription::inactive();
    }
    store.listen(
        &tiles_path(world_id),
        Arc::new(move |value: &Value| on_tiles(parse_tiles(value))),
        on_error,
    )
}

fn refuse_system_type(tile_type_id: &str, on_error: &ErrorFn) -> bool {
    if tile_type_id.starts_with('_') {
        log::debug!("Refusing to edit system tile type {tile_type_id}");
        on_error(&StoreError::PermissionDenied(format!("system tile type {tile_type_id}")));
        return true;
    }
    false
}
