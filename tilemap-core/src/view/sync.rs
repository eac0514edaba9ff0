//! Bidirectional sync between the in-memory [`ViewState`] and the shareable
//! token held by a [`LocationHash`] (a URL fragment in the browser).
//!
//! Every change is tagged with its [`Origin`]. Local changes are encoded and
//! written out; external changes (initial load, back/forward, a pasted link)
//! only overwrite local state. An external change is never written back, and
//! a local change whose token is already current is not written again, so the
//! two directions cannot feed each other.

use super::codec::{decode_with, encode, is_valid_world_id};
use super::{is_valid_scale, ViewDefaults, ViewState};

/// The external holder of the shareable token.
pub trait LocationHash {
    /// Current token, `None` when there is none.
    fn read(&self) -> Option<String>;

    /// Replace the token (a new history entry in the browser).
    fn write(&mut self, token: &str);
}

/// Who caused a view-state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Decoded from the token (mount, navigation, pasted link).
    External,
    /// Produced by a local setter (keyboard, zoom buttons, world switch).
    Local,
}

/// A new view state plus the direction it travels in.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub state: ViewState,
    pub origin: Origin,
}

impl ViewUpdate {
    pub fn local(state: ViewState) -> Self {
        Self {
            state,
            origin: Origin::Local,
        }
    }

    pub fn external(state: ViewState) -> Self {
        Self {
            state,
            origin: Origin::External,
        }
    }
}

/// Single owner of the local [`ViewState`].
///
/// Dropping it, or calling [`ViewStateSync::unmount`], ends the sync; since
/// the location is owned, nothing can write to it after teardown.
#[derive(Debug)]
pub struct ViewStateSync<L: LocationHash> {
    location: L,
    defaults: ViewDefaults,
    view: ViewState,
    /// Token last seen on, or written to, the location.
    last_token: Option<String>,
}

impl<L: LocationHash> ViewStateSync<L> {
    /// Seed local state from whatever token the location holds.
    ///
    /// Mounting never writes: a missing token stays missing until the first
    /// local change.
    pub fn mount(location: L, defaults: ViewDefaults) -> Self {
        let token = location.read();
        let view = token
            .as_deref()
            .and_then(|t| decode_with(t, &defaults))
            .unwrap_or_else(|| defaults.view_state());
        log::debug!("View sync mounted at {view:?}");
        Self {
            location,
            defaults,
            view,
            last_token: token,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn defaults(&self) -> &ViewDefaults {
        &self.defaults
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// Drive the location from outside (history navigation, pasted links).
    /// Follow up with [`ViewStateSync::on_location_change`].
    pub fn location_mut(&mut self) -> &mut L {
        &mut self.location
    }

    /// Token for the current state.
    pub fn token(&self) -> String {
        encode(&self.view)
    }

    /// Apply an update. Returns whether local state changed.
    pub fn apply(&mut self, update: ViewUpdate) -> bool {
        if update.state == self.view {
            return false;
        }
        self.view = update.state;
        match update.origin {
            Origin::External => {
                self.last_token = self.location.read();
            }
            Origin::Local => {
                let token = encode(&self.view);
                if self.location.read().as_deref() != Some(token.as_str()) {
                    log::trace!("View token -> {token}");
                    self.location.write(&token);
                }
                self.last_token = Some(token);
            }
        }
        true
    }

    /// React to the location's token having changed underneath us.
    ///
    /// Echoes of our own last write are ignored. An unreadable or missing
    /// token resets local state to the defaults. Returns whether local state
    /// changed.
    pub fn on_location_change(&mut self) -> bool {
        let token = self.location.read();
        if token == self.last_token {
            return false;
        }
        let view = token
            .as_deref()
            .and_then(|t| decode_with(t, &self.defaults))
            .unwrap_or_else(|| self.defaults.view_state());
        self.last_token = token;
        self.apply(ViewUpdate::external(view))
    }

    /// Switch worlds. Ids that could not travel in a token are refused.
    pub fn set_world(&mut self, world_id: &str) -> bool {
        if !is_valid_world_id(world_id) {
            log::warn!("Refusing world id {world_id:?}: not URL-safe");
            return false;
        }
        let next = ViewState {
            world_id: world_id.to_string(),
            ..self.view.clone()
        };
        self.apply(ViewUpdate::local(next))
    }

    pub fn set_coords(&mut self, x: i64, y: i64) -> bool {
        let next = ViewState {
            x,
            y,
            ..self.view.clone()
        };
        self.apply(ViewUpdate::local(next))
    }

    pub fn pan(&mut self, dx: i64, dy: i64) -> bool {
        let next = self.view.panned(dx, dy);
        self.apply(ViewUpdate::local(next))
    }

    /// Set the zoom. Non-finite or non-positive scales are refused.
    pub fn set_scale(&mut self, scale: f64) -> bool {
        if !is_valid_scale(scale) {
            return false;
        }
        let next = ViewState {
            scale,
            ..self.view.clone()
        };
        self.apply(ViewUpdate::local(next))
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_scale(self.view.scale * self.defaults.zoom_factor)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_scale(self.view.scale / self.defaults.zoom_factor)
    }

    /// Tear down and hand the location back.
    pub fn unmount(self) -> L {
        self.location
    }
}

/// In-memory stand-in for the browser's location fragment and history.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    entries: Vec<String>,
    /// Index of the current entry; `None` before the first entry.
    current: Option<usize>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location opened from a link that already carries a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            entries: vec![token.into()],
            current: Some(0),
        }
    }

    /// Navigate to a token from outside (pasted link, manual edit).
    pub fn navigate(&mut self, token: impl Into<String>) {
        self.push(token.into());
    }

    /// Step back one history entry. Returns whether the token changed.
    pub fn back(&mut self) -> bool {
        match self.current {
            Some(i) if i > 0 => {
                self.current = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward one history entry. Returns whether the token changed.
    pub fn forward(&mut self) -> bool {
        match self.current {
            Some(i) if i + 1 < self.entries.len() => {
                self.current = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    /// Every history entry, oldest first.
    pub fn history(&self) -> &[String] {
        &self.entries
    }

    fn push(&mut self, token: String) {
        let keep = self.current.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push(token);
        self.current = Some(self.entries.len() - 1);
    }
}

impl LocationHash for MemoryLocation {
    fn read(&self) -> Option<String> {
        self.current.and_then(|i| self.entries.get(i)).cloned()
    }

    fn write(&mut self, token: &str) {
        self.push(token.to_string());
    }
}
