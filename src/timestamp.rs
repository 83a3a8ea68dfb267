//! Timestamps counted in 100-nanosecond intervals since the Gregorian epoch (1582-10-15T00:00Z).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of 100-nanosecond intervals between the Gregorian epoch and the Unix epoch.
pub const GREGORIAN_OFFSET: u64 = 0x01b2_1dd2_1381_4000;

/// Largest timestamp that fits in the 60-bit field of a version 1 UUID.
pub const MAX_TIMESTAMP: u64 = (1 << 60) - 1;

const INTERVALS_PER_SECOND: u64 = 10_000_000;
const NANOS_PER_INTERVAL: u32 = 100;

/// Returns the timestamp of the current system time.
///
/// The precision is that of the host clock, truncated to 100 nanoseconds.
pub fn current_timestamp() -> u64 {
    from_system_time(SystemTime::now())
}

/// Converts a [`SystemTime`] to a timestamp, saturating at zero for instants before the
/// Gregorian epoch.
pub fn from_system_time(time: SystemTime) -> u64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => GREGORIAN_OFFSET.saturating_add(to_intervals(since)),
        Err(err) => GREGORIAN_OFFSET.saturating_sub(to_intervals(err.duration())),
    }
}

/// Converts a timestamp to the [`SystemTime`] it stands for.
pub fn to_system_time(timestamp: u64) -> SystemTime {
    if timestamp >= GREGORIAN_OFFSET {
        UNIX_EPOCH + to_duration(timestamp - GREGORIAN_OFFSET)
    } else {
        UNIX_EPOCH - to_duration(GREGORIAN_OFFSET - timestamp)
    }
}

fn to_intervals(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_mul(INTERVALS_PER_SECOND)
        .saturating_add((duration.subsec_nanos() / NANOS_PER_INTERVAL) as u64)
}

fn to_duration(intervals: u64) -> Duration {
    Duration::new(
        intervals / INTERVALS_PER_SECOND,
        (intervals % INTERVALS_PER_SECOND) as u32 * NANOS_PER_INTERVAL,
    )
}
