//! File-time tick conversion.
//!
//! The server reports modification times as platform file-time: a count of
//! 100 ns ticks since 1601-01-01T00:00:00Z.

use chrono::{DateTime, Utc};

/// Ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// File-time value of 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// Convert file-time ticks to a UTC timestamp.
///
/// Returns `None` for negative tick counts, which have no file-time meaning.
pub fn ticks_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks < 0 {
        return None;
    }
    let since_unix = ticks - UNIX_EPOCH_TICKS;
    let secs = since_unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Convert a UTC timestamp to file-time ticks, truncating below 100 ns.
///
/// Returns `None` for instants before 1601 or beyond the `i64` tick range.
pub fn datetime_to_ticks(time: DateTime<Utc>) -> Option<i64> {
    let sub_ticks = i64::from(time.timestamp_subsec_nanos() / 100);
    time.timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(sub_ticks)?
        .checked_add(UNIX_EPOCH_TICKS)
        .filter(|ticks| *ticks >= 0)
}
