//! Staleness clock shared by presence and any other time-based feature.
//!
//! All comparisons are made between two store timestamps (milliseconds since
//! the Unix epoch), never against the local wall clock, so that clients whose
//! clocks drift relative to the store still agree on relative freshness.

use std::time::{Duration, SystemTime};

/// Milliseconds since the Unix epoch, as assigned by the shared store.
pub type Timestamp = u64;

/// How long a presence record stays trustworthy without a fresh write.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Time elapsed between `tstamp` and `reference`.
///
/// Saturates at zero when `tstamp` is ahead of `reference`.
#[inline]
pub fn elapsed(reference: Timestamp, tstamp: Timestamp) -> Duration {
    Duration::from_millis(reference.saturating_sub(tstamp))
}

/// A record expires once strictly more than `timeout` has elapsed.
#[inline]
pub fn is_expired(elapsed: Duration, timeout: Duration) -> bool {
    elapsed > timeout
}

/// Linear fade from 1.0 (fresh) to 0.0 (at expiry), clamped to `[0, 1]`.
pub fn fade(elapsed: Duration, timeout: Duration) -> f64 {
    if timeout.is_zero() {
        return if elapsed.is_zero() { 1.0 } else { 0.0 };
    }
    (1.0 - elapsed.as_secs_f64() / timeout.as_secs_f64()).clamp(0.0, 1.0)
}

/// Local wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}
