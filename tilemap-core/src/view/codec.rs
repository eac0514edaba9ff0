//! Shareable token format for [`ViewState`].
//!
//! ```text
//! w=<world>&x=<x>&y=<y>&s=<scale>
//! ```
//!
//! Fields are always written in that order so encoding is deterministic.
//! Every character is URL-safe, so the token can sit in a link fragment
//! as-is. Decoding is lenient: unknown keys are ignored, the first occurrence
//! of a key wins, and any missing or unparseable field falls back to
//! [`ViewDefaults`].

use super::{is_valid_scale, ViewDefaults, ViewState};

const WORLD_KEY: &str = "w";
const X_KEY: &str = "x";
const Y_KEY: &str = "y";
const SCALE_KEY: &str = "s";

const MAX_WORLD_ID_LEN: usize = 128;

/// World ids travel unescaped, so only `A-Z a-z 0-9 - _` are allowed.
pub fn is_valid_world_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_WORLD_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Serialize a view state into its token.
///
/// Scale uses Rust's shortest round-trip decimal form, so `32.0` encodes as
/// `32`. A world id that is not URL-safe is left out of the token.
pub fn encode(view: &ViewState) -> String {
    let mut token = String::with_capacity(32);
    if is_valid_world_id(&view.world_id) {
        token.push_str(WORLD_KEY);
        token.push('=');
        token.push_str(&view.world_id);
        token.push('&');
    }
    token.push_str(&format!("{X_KEY}={}&{Y_KEY}={}", view.x, view.y));
    if is_valid_scale(view.scale) {
        token.push_str(&format!("&{SCALE_KEY}={}", view.scale));
    }
    token
}

/// Decode with the process-wide [`ViewDefaults`].
pub fn decode(token: &str) -> Option<ViewState> {
    decode_with(token, &ViewDefaults::default())
}

/// Decode a token, filling gaps from `defaults`.
///
/// Returns `None` when the token is empty or not a single field in it could
/// be understood; callers then fall back to `defaults` wholesale.
pub fn decode_with(token: &str, defaults: &ViewDefaults) -> Option<ViewState> {
    let body = token.trim().trim_start_matches(['#', '?']);
    if body.is_empty() {
        return None;
    }

    let mut world: Option<&str> = None;
    let mut x: Option<i64> = None;
    let mut y: Option<i64> = None;
    let mut scale: Option<f64> = None;

    for pair in body.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            WORLD_KEY if world.is_none() && is_valid_world_id(value) => world = Some(value),
            X_KEY if x.is_none() => x = value.parse().ok(),
            Y_KEY if y.is_none() => y = value.parse().ok(),
            SCALE_KEY if scale.is_none() => {
                scale = value.parse().ok().filter(|s| is_valid_scale(*s));
            }
            _ => {}
        }
    }

    if world.is_none() && x.is_none() && y.is_none() && scale.is_none() {
        log::debug!("Ignoring unreadable view token {token:?}");
        return None;
    }

    Some(ViewState {
        world_id: world.map_or_else(|| defaults.world_id.clone(), str::to_string),
        x: x.unwrap_or(defaults.x),
        y: y.unwrap_or(defaults.y),
        scale: scale.unwrap_or(defaults.scale),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        let view = ViewState::new("abc", -3, 7, 32.0);
        assert_eq!(encode(&view), "w=abc&x=-3&y=7&s=32");
    }

    #[test]
    fn test_encode_fractional_scale() {
        let view = ViewState::new("abc", 0, 0, 1.5);
        assert_eq!(encode(&view), "w=abc&x=0&y=0&s=1.5");
    }

    #[test]
    fn test_roundtrip_extremes() {
        for view in [
            ViewState::new("w", i64::MIN, i64::MAX, 32.0),
            ViewState::new("-_-", 0, 0, 0.1),
            ViewState::new("World_42", -1, 1, 1e-7),
            ViewState::new("a", 5, 5, 1234567.891),
        ] {
            let decoded = decode(&encode(&view)).unwrap();
            assert_eq!(decoded.world_id, view.world_id);
            assert_eq!((decoded.x, decoded.y), (view.x, view.y));
            assert!((decoded.scale - view.scale).abs() <= f64::EPSILON * view.scale);
        }
    }

    #[test]
    fn test_reencode_is_stable() {
        let token = "w=abc&x=1&y=2&s=16";
        assert_eq!(encode(&decode(token).unwrap()), token);
    }

    #[test]
    fn test_decode_empty_and_garbage() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("   "), None);
        assert_eq!(decode("#"), None);
        assert_eq!(decode("garbage"), None);
        assert_eq!(decode("x=abc&s=-1&w=bad world"), None);
        assert_eq!(decode("&&&==="), None);
    }

    #[test]
    fn test_decode_missing_fields_take_defaults() {
        let view = decode("x=4").unwrap();
        assert_eq!(view, ViewState::new("default", 4, 0, 32.0));

        let view = decode("w=zone").unwrap();
        assert_eq!(view, ViewState::new("zone", 0, 0, 32.0));
    }

    #[test]
    fn test_decode_invalid_field_takes_default() {
        let view = decode("w=zone&x=1&y=oops&s=0").unwrap();
        assert_eq!(view, ViewState::new("zone", 1, 0, 32.0));
    }

    #[test]
    fn test_decode_rejects_non_finite_scale() {
        assert_eq!(decode("w=z&s=inf").unwrap().scale, 32.0);
        assert_eq!(decode("w=z&s=NaN").unwrap().scale, 32.0);
    }

    #[test]
    fn test_decode_accepts_fragment_prefix() {
        assert_eq!(decode("#w=z&x=1&y=2&s=8"), Some(ViewState::new("z", 1, 2, 8.0)));
        assert_eq!(decode("?w=z&x=1&y=2&s=8"), Some(ViewState::new("z", 1, 2, 8.0)));
    }

    #[test]
    fn test_decode_first_key_wins_and_unknown_ignored() {
        let view = decode("x=1&x=2&zoom=3&y=5").unwrap();
        assert_eq!((view.x, view.y), (1, 5));
    }

    #[test]
    fn test_decode_with_custom_defaults() {
        let defaults = ViewDefaults {
            world_id: "lobby".into(),
            x: 10,
            y: 20,
            scale: 64.0,
            zoom_factor: 2.0,
        };
        assert_eq!(decode_with("s=8", &defaults), Some(ViewState::new("lobby", 10, 20, 8.0)));
    }

    #[test]
    fn test_encode_omits_unsafe_world() {
        let token = encode(&ViewState::new("a/b", 1, 1, 32.0));
        assert_eq!(token, "x=1&y=1&s=32");
    }

    #[test]
    fn test_world_id_validation() {
        assert!(is_valid_world_id("-Nx0_abc"));
        assert!(!is_valid_world_id(""));
        assert!(!is_valid_world_id("a&x=1"));
        assert!(!is_valid_world_id(&"a".repeat(129)));
    }
}
