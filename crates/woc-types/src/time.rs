use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset};

/// An authored or committed instant, carrying the offset recorded in the
/// commit header.
///
/// Comparisons between two `CommitTime`s compare instants, independent of
/// their offsets.
pub type CommitTime = DateTime<FixedOffset>;

/// The ordering stand-in for commits whose time is unknown: the Unix epoch.
pub fn unknown_time_sentinel() -> CommitTime {
    DateTime::from_timestamp(0, 0)
        .unwrap_or_default()
        .fixed_offset()
}

/// Parse a commit header date such as `"1337145807 +1100"`.
///
/// Returns `None` when the timestamp or offset is malformed, or when the
/// instant lies in the future relative to the wall clock. Neither case is an
/// error: callers treat both as an unknown date.
pub fn parse_commit_time(value: &str) -> Option<CommitTime> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(i64::MAX);
    parse_commit_time_at(value, now)
}

/// Same as [`parse_commit_time`] with an explicit "now" in unix seconds.
pub fn parse_commit_time_at(value: &str, now: i64) -> Option<CommitTime> {
    let mut tokens = value.split_whitespace();
    let (ts, tz) = (tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }

    let ts: i64 = ts.parse().ok()?;
    let offset = parse_offset(tz)?;
    if ts > now {
        return None;
    }
    let utc = DateTime::from_timestamp(ts, 0)?;
    Some(utc.with_timezone(&offset))
}

/// Parse a signed `hhmm` offset (`+1100`, `-0430`).
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'-' => (-1, &tz[1..]),
        b'+' => (1, &tz[1..]),
        _ => (1, tz),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_positive_offset() {
        let dt = parse_commit_time("1337145807 +1100").unwrap();
        assert_eq!(dt.timestamp(), 1337145807);
        assert_eq!(dt.offset().local_minus_utc(), 11 * 3600);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2012, 5, 16));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (16, 23, 27));
    }

    #[test]
    fn parses_negative_offset_with_minutes() {
        let dt = parse_commit_time("1375321509 -0430").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -(4 * 3600 + 30 * 60));
        assert_eq!(dt.timestamp(), 1375321509);
    }

    #[test]
    fn future_timestamp_is_unknown() {
        assert!(parse_commit_time("3337145807 +1100").is_none());
        assert!(parse_commit_time_at("1000 +0000", 999).is_none());
        assert!(parse_commit_time_at("1000 +0000", 1000).is_some());
    }

    #[test]
    fn malformed_values_are_unknown() {
        assert!(parse_commit_time("").is_none());
        assert!(parse_commit_time("abc +0000").is_none());
        assert!(parse_commit_time("1337145807").is_none());
        assert!(parse_commit_time("1337145807 +11").is_none());
        assert!(parse_commit_time("1337145807 +1100 extra").is_none());
    }

    #[test]
    fn comparison_is_by_instant() {
        let a = parse_commit_time("1000 +1100").unwrap();
        let b = parse_commit_time("1001 -0500").unwrap();
        assert!(a < b);
    }

    #[test]
    fn sentinel_is_epoch() {
        assert_eq!(unknown_time_sentinel().timestamp(), 0);
    }
}
