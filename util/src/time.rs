//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if the nanosecond
/// count overflows.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Number of whole control cycles of length `period_s` that fit in `time_s`.
///
/// Rounded to the nearest cycle so that `n * period` accumulated in floating
/// point maps back to `n`.
pub fn seconds_to_cycles(time_s: f64, period_s: f64) -> u64 {
    if period_s <= 0.0 || time_s <= 0.0 {
        return 0
    }
    (time_s / period_s).round() as u64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(1500);
        assert_eq!(duration_to_seconds(d), Some(1.5));
    }

    #[test]
    fn test_seconds_to_cycles() {
        assert_eq!(seconds_to_cycles(2.0, 0.005), 400);
        assert_eq!(seconds_to_cycles(0.0, 0.005), 0);
        assert_eq!(seconds_to_cycles(1.0, 0.0), 0);
    }
}
