//! Tile-type catalog and resolution.
//!
//! Every world sees the process-wide [`default_tile_types`] catalog, patched
//! by whatever per-world override records the shared store holds. The
//! effective index is recomputed from scratch whenever either input changes;
//! catalogs hold tens of entries so there is nothing worth caching.

use std::sync::LazyLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::merge::merge_maps_deep_left;

/// One tile type as consumed by the toolbar and the renderer.
///
/// Only `id`, `order` and `label` are guaranteed by the resolver; everything
/// else a world defines is kept in `extra` so overrides can add attributes
/// without a schema change. A field holding the wrong kind of value reads as
/// its default rather than hiding the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileType {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub label: String,
    /// Renderer-consumable background descriptor (`{ "color": .., "image": .. }`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Value>,
    /// Tile logic script source.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient")]
    pub logic: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TileType {
    /// System types (ids starting with `_`) cannot be edited per world.
    pub fn is_editable(&self) -> bool {
        !self.id.is_empty() && !self.id.starts_with('_')
    }

    /// Solid fill color from the background descriptor, if any.
    pub fn background_color(&self) -> Option<&str> {
        self.background.as_ref()?.get("color")?.as_str()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        log::debug!("Ignoring tile-type field {raw}: {e}");
        T::default()
    }))
}

/// Orders edited as text (`"3"`) still sort where they were meant to.
fn lenient_order<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let order = match &raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|o| o.is_finite()),
        _ => None,
    };
    Ok(order.unwrap_or_else(|| {
        log::debug!("Ignoring tile-type order {raw}");
        0.0
    }))
}

static DEFAULT_TILE_TYPES: LazyLock<Map<String, Value>> = LazyLock::new(|| {
    let catalog = json!({
        "_none": {
            "id": "_none",
            "order": 0,
            "label": "None",
            "background": { "color": "transparent" }
        },
        "grass": {
            "id": "grass",
            "order": 1,
            "label": "Grass",
            "background": { "color": "#5a9e3c" },
            "passable": true
        },
        "water": {
            "id": "water",
            "order": 2,
            "label": "Water",
            "background": { "color": "#3a7bd5" },
            "passable": false
        },
        "sand": {
            "id": "sand",
            "order": 3,
            "label": "Sand",
            "background": { "color": "#e2c98b" },
            "passable": true
        },
        "stone": {
            "id": "stone",
            "order": 4,
            "label": "Stone",
            "background": { "color": "#8a8a8a" },
            "passable": false
        }
    });
    match catalog {
        Value::Object(map) => map,
        _ => Map::new(),
    }
});

/// The read-only, process-wide default catalog.
pub fn default_tile_types() -> &'static Map<String, Value> {
    &DEFAULT_TILE_TYPES
}

/// Merge a world's overrides over the defaults.
///
/// Absent inputs are treated as empty mappings. Override attributes win at
/// every nesting level; non-mapping values are replaced wholesale.
pub fn resolve(
    overrides: Option<&Map<String, Value>>,
    defaults: Option<&Map<String, Value>>,
) -> EffectiveTileTypes {
    let empty = Map::new();
    let merged = merge_maps_deep_left(overrides.unwrap_or(&empty), defaults.unwrap_or(&empty));
    EffectiveTileTypes(merged)
}

/// Merged, render-ready tile-type index keyed by tile-type id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveTileTypes(Map<String, Value>);

impl EffectiveTileTypes {
    /// Raw merged mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Typed view of one entry.
    ///
    /// An override that only names a few attributes may omit `id`; the index
    /// key fills it in. Entries that do not parse as a tile type yield `None`.
    pub fn get(&self, id: &str) -> Option<TileType> {
        let raw = self.0.get(id)?;
        match serde_json::from_value::<TileType>(raw.clone()) {
            Ok(mut tile_type) => {
                if tile_type.id.is_empty() {
                    tile_type.id = id.to_string();
                }
                Some(tile_type)
            }
            Err(e) => {
                log::warn!("Skipping malformed tile type {id}: {e}");
                None
            }
        }
    }

    /// All parseable entries in toolbar order (ascending `order`, ties by id).
    pub fn ordered(&self) -> Vec<TileType> {
        let mut types: Vec<TileType> = self.0.keys().filter_map(|id| self.get(id)).collect();
        types.sort_by(|a, b| a.order.total_cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        types
    }
}

/// Holds the latest value of both inputs and the index derived from them.
///
/// The two inputs arrive on independent streams in any order; the index is
/// always a pure function of whichever values arrived last.
#[derive(Debug, Clone)]
pub struct TileTypeResolver {
    defaults: Map<String, Value>,
    overrides: Map<String, Value>,
    effective: EffectiveTileTypes,
}

impl TileTypeResolver {
    pub fn new(defaults: Map<String, Value>) -> Self {
        let effective = resolve(None, Some(&defaults));
        Self {
            defaults,
            overrides: Map::new(),
            effective,
        }
    }

    /// Resolver seeded with [`default_tile_types`].
    pub fn with_default_catalog() -> Self {
        Self::new(default_tile_types().clone())
    }

    pub fn set_defaults(&mut self, defaults: Map<String, Value>) -> &EffectiveTileTypes {
        self.defaults = defaults;
        self.recompute()
    }

    pub fn set_overrides(&mut self, overrides: Map<String, Value>) -> &EffectiveTileTypes {
        self.overrides = overrides;
        self.recompute()
    }

    /// Accept a raw store snapshot; anything but a mapping counts as empty.
    pub fn set_overrides_value(&mut self, snapshot: &Value) -> &EffectiveTileTypes {
        let overrides = match snapshot {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                log::debug!("Ignoring non-mapping tile-type overrides: {other}");
                Map::new()
            }
        };
        self.set_overrides(overrides)
    }

    pub fn effective(&self) -> &EffectiveTileTypes {
        &self.effective
    }

    pub fn overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }

    fn recompute(&mut self) -> &EffectiveTileTypes {
        self.effective = resolve(Some(&self.overrides), Some(&self.defaults));
        &self.effective
    }
}

impl Default for TileTypeResolver {
    fn default() -> Self {
        Self::with_default_catalog()
    }
}
