//! Time utility functions

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Parse an RFC 3339 timestamp string to DateTime<Utc>
pub fn parse_rfc3339(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(ts, "Invalid RFC 3339 timestamp, using epoch");
            DateTime::UNIX_EPOCH
        })
}

/// Format a DateTime<Utc> as RFC 3339 with microsecond precision
pub fn format_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a chat-platform message id (`<seconds>.<microseconds>`) into a UTC instant.
///
/// Returns None when the string is not a well-formed timestamp id.
pub fn message_ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = match ts.split_once('.') {
        Some((s, m)) => (s.parse::<i64>().ok()?, m.parse::<u32>().ok()?),
        None => (ts.parse::<i64>().ok()?, 0),
    };
    DateTime::from_timestamp(secs, micros.checked_mul(1_000)?)
}

/// Format a UTC instant as a chat-platform timestamp id (`<seconds>.<microseconds>`)
pub fn datetime_to_message_ts(dt: DateTime<Utc>) -> String {
    format!("{}.{:06}", dt.timestamp(), dt.timestamp_subsec_micros())
}

/// Format the partition date segment (`YYYY-MM-DD`) for a calendar date
pub fn dt_segment(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` partition date segment
pub fn parse_dt_segment(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339_valid() {
        let dt = parse_rfc3339("2025-10-15T23:59:00Z");
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 59);
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_rfc3339("2025-10-15T10:30:00+05:00");
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_rfc3339_invalid() {
        assert_eq!(parse_rfc3339("not-a-timestamp"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_message_ts_round_trip() {
        let ts = "1760572740.000123";
        let dt = message_ts_to_datetime(ts).unwrap();
        assert_eq!(datetime_to_message_ts(dt), ts);
    }

    #[test]
    fn test_message_ts_without_fraction() {
        let dt = message_ts_to_datetime("1760572740").unwrap();
        assert_eq!(dt.timestamp(), 1760572740);
        assert_eq!(dt.timestamp_subsec_micros(), 0);
    }

    #[test]
    fn test_message_ts_malformed() {
        assert!(message_ts_to_datetime("abc.def").is_none());
        assert!(message_ts_to_datetime("").is_none());
    }

    #[test]
    fn test_dt_segment_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        assert_eq!(dt_segment(date), "2025-10-15");
        assert_eq!(parse_dt_segment("2025-10-15"), Some(date));
        assert_eq!(parse_dt_segment("2025-13-40"), None);
    }
}
