//! Timing utilities for YFP
//!
//! Envelope timestamps are wall-clock milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp type (milliseconds)
pub type Timestamp = i64;

/// Get current Unix timestamp in milliseconds
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Milliseconds elapsed between `earlier` and now, clamped at zero
pub fn millis_since(earlier: Timestamp) -> i64 {
    (now_millis() - earlier).max(0)
}
