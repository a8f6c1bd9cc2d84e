//! Lenient parsers for the sizes, durations and timestamps found on tracker pages.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;

static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([KMGT])i?B\b").expect("static regex")
});

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(days?|d|天|hours?|hrs?|h|小时|时|minutes?|mins?|m|分钟|分)",
    )
    .expect("static regex")
});

static PLAIN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").expect("static regex"));

static DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2}))?)?")
        .expect("static regex")
});

static DATETIME_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{4}[-/]\d{1,2}[-/]\d{1,2}(?:[ T]+\d{1,2}:\d{2}(?::\d{2})?)?\s*$")
        .expect("static regex")
});

/// Parse a size like `10.5 GB` or `700 MiB` into bytes (binary multiples).
pub fn parse_size_bytes(text: &str) -> Option<u64> {
    let caps = SIZE.captures(text)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    let exponent = match caps[2].to_ascii_uppercase().as_str() {
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        _ => return None,
    };
    Some((value * 1024f64.powi(exponent)) as u64)
}

/// Parse a duration into hours.
///
/// Accepts bare numbers (already hours), `72h`, `3d 4h`, `1d 2h 30m`,
/// `3天4小时` and `72.5 小时`.
pub fn parse_hours(text: &str) -> Option<f64> {
    if let Some(caps) = PLAIN_NUMBER.captures(text) {
        return caps[1].parse().ok();
    }

    let mut total = 0.0;
    let mut matched = false;
    for caps in DURATION_PART.captures_iter(text) {
        let value: f64 = match caps[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let unit = caps[2].to_lowercase();
        let factor = match unit.as_str() {
            "d" | "day" | "days" | "天" => 24.0,
            "h" | "hr" | "hrs" | "hour" | "hours" | "小时" | "时" => 1.0,
            _ => 1.0 / 60.0,
        };
        total += value * factor;
        matched = true;
    }
    matched.then_some(total)
}

/// Parse the first `YYYY-MM-DD[ HH:MM[:SS]]` timestamp in the text as UTC.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let caps = DATETIME.captures(text)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let minute: u32 = caps.get(5).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let second: u32 = caps.get(6).map_or(Some(0), |m| m.as_str().parse().ok())?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Whether the text carries an explicit date (used to pick timestamp cells).
pub fn contains_datetime(text: &str) -> bool {
    DATETIME.is_match(text)
}

/// Whether the text is nothing but a timestamp.
pub fn is_datetime(text: &str) -> bool {
    DATETIME_ONLY.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_bytes() {
        assert_eq!(parse_size_bytes("1 KB"), Some(1024));
        assert_eq!(parse_size_bytes("1.5 GB"), Some(1_610_612_736));
        assert_eq!(parse_size_bytes("700MiB"), Some(734_003_200));
        assert_eq!(parse_size_bytes("1,024 MB"), Some(1_073_741_824));
        assert_eq!(parse_size_bytes("2 TB"), Some(2_199_023_255_552));
        assert_eq!(parse_size_bytes("no size"), None);
    }

    #[test]
    fn test_parse_hours() {
        assert_eq!(parse_hours("72"), Some(72.0));
        assert_eq!(parse_hours(" 70.5 "), Some(70.5));
        assert_eq!(parse_hours("72h"), Some(72.0));
        assert_eq!(parse_hours("3d 4h"), Some(76.0));
        assert_eq!(parse_hours("1d 2h 30m"), Some(26.5));
        assert_eq!(parse_hours("3天4小时"), Some(76.0));
        assert_eq!(parse_hours("72.5 小时"), Some(72.5));
        assert_eq!(parse_hours("2 days"), Some(48.0));
        assert_eq!(parse_hours("--"), None);
    }

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("截止 2026-03-04 05:06:07").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-04T05:06:07+00:00");

        let dt = parse_datetime("2026/3/4 5:06").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-04T05:06:00+00:00");

        let dt = parse_datetime("2026-03-04").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-04T00:00:00+00:00");

        assert!(parse_datetime("2026-13-40").is_none());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_contains_vs_is_datetime() {
        assert!(contains_datetime("blocked until 2026-06-01 12:00"));
        assert!(!is_datetime("blocked until 2026-06-01 12:00"));
        assert!(is_datetime(" 2026-06-01 12:00:00 "));
        assert!(is_datetime("2026/6/1"));
    }
}
