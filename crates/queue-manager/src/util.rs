//! Time helpers shared by the store and the handlers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{QueueError, Result};

/// Storage format for timestamps. Lexical order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Stored value of a timestamp that has not happened yet.
pub const DEFAULT_TIMESTAMP: &str = "9999-01-01 00:00:00.000000";

/// Source of the current time.
///
/// Handlers never call `Utc::now()` directly so durations can be asserted
/// in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The "infinite future" used for unset timestamps.
pub fn default_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn is_default_timestamp(tm: &DateTime<Utc>) -> bool {
    *tm >= default_timestamp()
}

pub fn format_timestamp(tm: &DateTime<Utc>) -> String {
    tm.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| QueueError::invalid_argument(format!("invalid timestamp {}: {}", value, e)))
}

/// Milliseconds elapsed from `from` to `to`, never negative.
pub fn duration_ms(from: &DateTime<Utc>, to: &DateTime<Utc>) -> i64 {
    (*to - *from).num_milliseconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_timestamp_format_round_trips_default() {
        let tm = parse_timestamp(DEFAULT_TIMESTAMP).unwrap();
        assert!(is_default_timestamp(&tm));
        assert_eq!(format_timestamp(&tm), DEFAULT_TIMESTAMP);
    }

    #[test]
    fn test_parse_without_fraction() {
        let tm = parse_timestamp("2023-02-14 03:22:17").unwrap();
        assert_eq!(format_timestamp(&tm), "2023-02-14 03:22:17.000000");
    }

    #[test]
    fn test_duration_never_negative() {
        let now = Utc::now();
        assert_eq!(duration_ms(&now, &(now + Duration::milliseconds(60000))), 60000);
        assert_eq!(duration_ms(&now, &(now - Duration::seconds(1))), 0);
    }
}
