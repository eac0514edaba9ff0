//! Local navigation state and its shareable projection.
//!
//! ```text
//! setters ──Local──► ViewStateSync ──encode──► LocationHash (shareable token)
//!                        ▲    │
//!                        │    └── ViewState (source of truth)
//! back/forward ─External─┘◄─decode── LocationHash
//! ```

pub mod codec;
pub mod sync;

pub use codec::{decode, decode_with, encode, is_valid_world_id};
pub use sync::{LocationHash, MemoryLocation, Origin, ViewStateSync, ViewUpdate};

/// Where the local user is looking: which world, which tile, how zoomed.
///
/// `x`/`y` are signed tile indices; `scale` is pixels per tile.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub world_id: String,
    pub x: i64,
    pub y: i64,
    pub scale: f64,
}

impl ViewState {
    pub fn new(world_id: impl Into<String>, x: i64, y: i64, scale: f64) -> Self {
        Self {
            world_id: world_id.into(),
            x,
            y,
            scale,
        }
    }

    /// A state is valid when its world id is URL-safe and its scale is a
    /// finite positive number. Only valid states survive a token round trip.
    pub fn is_valid(&self) -> bool {
        is_valid_world_id(&self.world_id) && is_valid_scale(self.scale)
    }

    pub fn panned(&self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..self.clone()
        }
    }

    pub fn zoomed(&self, factor: f64) -> Self {
        Self {
            scale: self.scale * factor,
            ..self.clone()
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        ViewDefaults::default().view_state()
    }
}

pub(crate) fn is_valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Fallback values used wherever the token is silent.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefaults {
    /// Process-wide default world.
    pub world_id: String,
    pub x: i64,
    pub y: i64,
    /// Baseline zoom (pixels per tile).
    pub scale: f64,
    /// Multiplier applied by one zoom step.
    pub zoom_factor: f64,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            world_id: "default".to_string(),
            x: 0,
            y: 0,
            scale: 32.0,
            zoom_factor: 2.0,
        }
    }
}

impl ViewDefaults {
    /// Defaults pointing at a specific world.
    pub fn for_world(world_id: impl Into<String>) -> Self {
        Self {
            world_id: world_id.into(),
            ..Self::default()
        }
    }

    pub fn view_state(&self) -> ViewState {
        ViewState::new(self.world_id.clone(), self.x, self.y, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view_state() {
        let view = ViewState::default();
        assert_eq!(view.world_id, "default");
        assert_eq!((view.x, view.y), (0, 0));
        assert_eq!(view.scale, 32.0);
    }

    #[test]
    fn test_panned_and_zoomed() {
        let view = ViewState::new("w1", 3, -4, 32.0);
        assert_eq!(view.panned(-5, 10), ViewState::new("w1", -2, 6, 32.0));
        assert_eq!(view.zoomed(0.5).scale, 16.0);
    }

    #[test]
    fn test_panned_saturates() {
        let view = ViewState::new("w1", i64::MAX, i64::MIN, 32.0);
        let moved = view.panned(1, -1);
        assert_eq!((moved.x, moved.y), (i64::MAX, i64::MIN));
    }

    #[test]
    fn test_is_valid() {
        assert!(ViewState::new("w_1-A", 0, 0, 0.25).is_valid());
        assert!(!ViewState::new("has space", 0, 0, 32.0).is_valid());
        assert!(!ViewState::new("w", 0, 0, 0.0).is_valid());
        assert!(!ViewState::new("w", 0, 0, f64::NAN).is_valid());
    }
}
