//! Parsing of the date formats the listing uses for missing dates.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use regex::Regex;
use std::sync::LazyLock;

static YMD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[-./년]\s*(\d{1,2})\s*[-./월]\s*(\d{1,2})").unwrap()
});

/// Parse a calendar date such as `2024-05-01`, `2024.5.1` or `2024년 5월 1일`.
pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let caps = YMD_RE.captures(text)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Parse a stored missing-date string into an instant.
///
/// RFC 3339 timestamps are taken as-is; calendar dates are read as midnight in Seoul.
pub fn parse_missing_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    let midnight = parse_calendar_date(text)?.and_hms_opt(0, 0, 0)?;
    Seoul
        .from_local_datetime(&midnight)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Canonicalize a captured date to `YYYY-MM-DD`, or keep the raw text if it is not a valid date.
pub fn normalize_date_text(raw: &str) -> String {
    match parse_calendar_date(raw) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calendar_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(parse_calendar_date("2024-05-01"), expected);
        assert_eq!(parse_calendar_date("2024.5.1"), expected);
        assert_eq!(parse_calendar_date("2024/05/01"), expected);
        assert_eq!(parse_calendar_date("2024년 5월 1일"), expected);
        assert_eq!(parse_calendar_date("2024년05월01일 14:00"), expected);
    }

    #[test]
    fn test_parse_calendar_date_rejects_impossible_dates() {
        assert_eq!(parse_calendar_date("2024-13-45"), None);
        assert_eq!(parse_calendar_date("지난 봄"), None);
    }

    #[test]
    fn test_parse_missing_date_reads_seoul_midnight() {
        let ts = parse_missing_date("2024-05-01").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-04-30T15:00:00+00:00");
    }

    #[test]
    fn test_parse_missing_date_accepts_rfc3339() {
        let ts = parse_missing_date("2026-10-19T03:00:00+00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-10-19T03:00:00+00:00");
    }

    #[test]
    fn test_normalize_date_text() {
        assert_eq!(normalize_date_text("2024년 5월 1일"), "2024-05-01");
        assert_eq!(normalize_date_text("2024-99-99"), "2024-99-99");
    }
}
