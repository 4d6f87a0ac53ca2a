//! Timestamp and pacing-time utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Playback time covered by `bytes` at a constant `bytes_per_second`
///
/// A zero rate is treated as 1 byte/s.
pub fn playback_duration(bytes: u64, bytes_per_second: u64) -> Duration {
    let rate = bytes_per_second.max(1);
    let secs = bytes / rate;
    let rem = bytes % rate;
    // rem < rate, so rem * 1e9 / rate fits comfortably for any realistic rate
    let nanos = (rem as u128 * 1_000_000_000u128 / rate as u128) as u32;
    Duration::new(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_playback_duration_whole_seconds() {
        // 64 kbit/s == 8000 bytes/s
        assert_eq!(playback_duration(80_000, 8_000), Duration::from_secs(10));
    }

    #[test]
    fn test_playback_duration_fractional() {
        assert_eq!(playback_duration(800, 8_000), Duration::from_millis(100));
        assert_eq!(playback_duration(12_000, 8_000), Duration::from_millis(1500));
    }

    #[test]
    fn test_playback_duration_zero_rate_clamped() {
        assert_eq!(playback_duration(5, 0), Duration::from_secs(5));
    }

    #[test]
    fn test_playback_duration_zero_bytes() {
        assert_eq!(playback_duration(0, 16_000), Duration::ZERO);
    }
}
