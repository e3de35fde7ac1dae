//! Shared primitive IDs and time helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Store-local entry identifier. Never persisted; reassigned on load.
pub type EntryId = u64;
/// Seconds since the Unix epoch.
pub type UnixSecs = i64;
/// Lookup counter attached to every entry.
pub type ViewCount = u64;
/// Process-lifetime counter of snapshot attempts.
pub type SaveCount = u64;

/// Current wall-clock time in Unix seconds, `0` if the clock is before the epoch.
pub fn now_secs() -> UnixSecs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as UnixSecs)
        .unwrap_or(0)
}
