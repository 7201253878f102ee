use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in seconds; 0 if the clock is before the epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
