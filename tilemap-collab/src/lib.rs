//! # tilemap-collab: Shared-store side of the collaborative tile-map editor
//!
//! Every session talks to the others only through a [`SharedStore`]: cursor
//! records and tile-type overrides are written as path patches and read back
//! as full snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish    ┌──────────────┐   listen    ┌──────────────┐
//! │ Session A    │ ───────────► │ SharedStore  │ ──────────► │ Session B    │
//! │ PresenceEng. │              │ cursors/…    │  snapshots  │ PresenceEng. │
//! │ TileTypeEd.  │              │ worlds/…     │             │ TileTypeFeed │
//! └──────────────┘              └──────────────┘             └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`]: store contract, paths, and the in-process [`MemoryStore`]
//! - [`session`]: session ids and user identity
//! - [`presence`]: cursor publishing, staleness filtering, render projection
//! - [`tile_feed`]: live per-world tile-type index and field-level edits
//! - [`errors`]: dismissible error list

pub mod errors;
pub mod presence;
pub mod session;
pub mod store;
pub mod tile_feed;

// Re-exports for convenience
pub use errors::ErrorLog;
pub use presence::{
    latest_timestamp, parse_snapshot, ActiveUser, CursorRecord, CursorRenderData, CursorSnapshot,
    Pointer, PresenceConfig, PresenceEngine, StalenessReference, Viewport,
};
pub use session::{Identity, SessionId, UserIndex, UserProfile, UserRef};
pub use store::{
    log_errors, server_timestamp, ErrorFn, ManualClock, MemoryStore, Patch, ServerClock,
    SharedStore, SnapshotFn, StoreError, Subscription, SystemClock,
};
pub use tile_feed::{parse_tiles, subscribe_tiles, TileMap, TileTypeEditor, TileTypeFeed};
