//! # tilemap-core: I/O-free logic for the collaborative tile-map editor
//!
//! Everything here is a pure function of its inputs: no store handles, no
//! clocks read behind the caller's back (except [`clock::now_millis`], which
//! callers opt into).
//!
//! ## Modules
//!
//! - [`clock`]: staleness comparisons and the shared session timeout
//! - [`view`]: `ViewState`, its shareable token codec, and the
//!   bidirectional token sync
//! - [`merge`]: deep left-biased merge over `serde_json::Value`
//! - [`tile_types`]: default tile-type catalog and effective-index resolution

pub mod clock;
pub mod merge;
pub mod tile_types;
pub mod view;

// Re-exports for convenience
pub use clock::{Timestamp, SESSION_TIMEOUT};
pub use merge::{merge_deep_left, merge_maps_deep_left};
pub use tile_types::{default_tile_types, resolve, EffectiveTileTypes, TileType, TileTypeResolver};
pub use view::{
    LocationHash, MemoryLocation, Origin, ViewDefaults, ViewState, ViewStateSync, ViewUpdate,
};
