//! Deep left-biased structural merge over the tagged JSON value model.
//!
//! ```text
//! left  = { a: { y: 9 } }            (overrides)
//! right = { a: { x: 1, y: 2 }, b: 3 } (defaults)
//!             │
//!             ▼
//! merge_deep_left(left, right) = { a: { x: 1, y: 9 }, b: 3 }
//! ```
//!
//! Only the mapping variant is recursed into. Scalars, `null` and sequences on
//! the left replace whatever sits on the right wholesale; sequences are never
//! merged element-wise.

use serde_json::{Map, Value};

/// Merge `left` over `right`, with `left` winning at every nesting level.
///
/// Neither input is modified.
pub fn merge_deep_left(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => Value::Object(merge_maps_deep_left(l, r)),
        _ => left.clone(),
    }
}

/// Mapping-level variant of [`merge_deep_left`].
///
/// Keys present in only one side are carried over unmodified.
pub fn merge_maps_deep_left(
    left: &Map<String, Value>,
    right: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = right.clone();
    for (key, lv) in left {
        let value = match right.get(key) {
            Some(rv) => merge_deep_left(lv, rv),
            None => lv.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}
