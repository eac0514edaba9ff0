//! Hierarchical store paths.
//!
//! ```text
//! cursors/{worldId}/{sessionId}
//! worlds/{worldId}/tileTypes/{tileTypeId}[/{field}]
//! worlds/{worldId}/tiles/{x}_{y}
//! ```

use super::StoreError;

/// Characters the store refuses inside a path segment.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Split a `/`-separated path into its segments, ignoring empty ones.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(FORBIDDEN) && !segment.chars().any(char::is_control)
}

/// A path is valid when it has at least one segment and every segment is.
pub fn is_valid_path(path: &str) -> bool {
    let segs = segments(path);
    !segs.is_empty() && segs.iter().all(|s| is_valid_segment(s))
}

/// Check caller-supplied ids before they are spliced into a path. An id
/// containing `/` or nothing at all would address a different record.
pub fn ensure_segments(segments: &[&str]) -> Result<(), StoreError> {
    match segments.iter().find(|s| !is_valid_segment(s)) {
        Some(bad) => Err(StoreError::InvalidPath((*bad).to_string())),
        None => Ok(()),
    }
}

/// Store key of the tile at `(x, y)`.
pub fn tile_key(x: i64, y: i64) -> String {
    format!("{x}_{y}")
}

/// Inverse of [`tile_key`].
pub fn parse_tile_key(key: &str) -> Option<(i64, i64)> {
    // Split on the last '_' so a negative x ("-3_4") parses.
    let (x, y) = key.rsplit_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}

pub fn cursors_path(world_id: &str) -> String {
    format!("cursors/{world_id}")
}

pub fn cursor_path(world_id: &str, session: &str) -> String {
    format!("cursors/{world_id}/{session}")
}

pub fn tile_types_path(world_id: &str) -> String {
    format!("worlds/{world_id}/tileTypes")
}

pub fn tile_type_path(world_id: &str, tile_type_id: &str) -> String {
    format!("worlds/{world_id}/tileTypes/{tile_type_id}")
}

pub fn tile_type_field_path(world_id: &str, tile_type_id: &str, field: &str) -> String {
    format!("worlds/{world_id}/tileTypes/{tile_type_id}/{field}")
}

pub fn tiles_path(world_id: &str) -> String {
    format!("worlds/{world_id}/tiles")
}

pub fn tile_path(world_id: &str, x: i64, y: i64) -> String {
    format!("worlds/{world_id}/tiles/{}", tile_key(x, y))
}
