//! Shared utility functions

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Safely truncate a string to at most `max_chars` characters, appending an
/// ellipsis when anything was cut.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(excerpt("hello world", 5), "hello…");
/// assert_eq!(excerpt("hi", 5), "hi");
/// ```
pub fn excerpt(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        None => trimmed.to_string(),
        Some((end, _)) => format!("{}…", trimmed[..end].trim_end()),
    }
}

/// Format a count compactly with K/M suffixes
///
/// # Examples
/// ```ignore
/// assert_eq!(format_compact_number(954356), "954K");
/// assert_eq!(format_compact_number(1_500_000), "1.5M");
/// assert_eq!(format_compact_number(42), "42");
/// ```
pub fn format_compact_number(n: i64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

/// Human-readable age of a timestamp relative to `now`
///
/// Future timestamps (clock skew between writers) read as "just now".
/// Anything older than 30 days is shown as a calendar date.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }

    let (value, unit) = match secs {
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 86_400 * 30 => (s / 86_400, "day"),
        _ => return then.format("%Y-%m-%d").to_string(),
    };

    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

/// Everything but the RFC 3986 unreserved characters is encoded
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a value for use inside a URL query string
pub fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// `k=v&k=v` with every value encoded
pub fn query_string(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode_query_value(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_excerpt_shorter_than_max() {
        assert_eq!(excerpt("hello", 10), "hello");
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        // Each Bengali letter here is a multi-byte scalar value
        assert_eq!(excerpt("বলবিদ্যা", 2), "বল…");
        assert_eq!(excerpt("hello world", 5), "hello…");
    }

    #[test]
    fn test_excerpt_empty_string() {
        assert_eq!(excerpt("   ", 5), "");
    }

    #[test]
    fn test_compact_numbers() {
        assert_eq!(format_compact_number(42), "42");
        assert_eq!(format_compact_number(954_356), "954K");
        assert_eq!(format_compact_number(1_500_000), "1.5M");
    }

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::seconds(30), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2 days ago");
        assert_eq!(time_ago(now - Duration::days(45), now), "2024-03-26");
    }

    #[test]
    fn test_time_ago_future_is_just_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now + Duration::minutes(3), now), "just now");
    }

    #[test]
    fn test_encode_query_value() {
        assert_eq!(encode_query_value("a b&c"), "a%20b%26c");
        assert_eq!(encode_query_value("a+b=c#d"), "a%2Bb%3Dc%23d");
        assert_eq!(encode_query_value("gc-1_2.3~"), "gc-1_2.3~");
        assert_eq!(encode_query_value("গতি"), "%E0%A6%97%E0%A6%A4%E0%A6%BF");
    }

    #[test]
    fn test_query_string() {
        assert_eq!(
            query_string(&[("sort", "votes"), ("q", "F = ma")]),
            "sort=votes&q=F%20%3D%20ma"
        );
        assert_eq!(query_string(&[]), "");
    }
}
