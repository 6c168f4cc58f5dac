//! Date parsing for extracted fields
//!
//! Forum pages carry dates in a handful of common layouts. Rather than ask
//! every selector file to specify a format, extraction tries a fixed table
//! and normalizes whatever matches to an ISO 8601 timestamp.

use chrono::{NaiveDate, NaiveDateTime};

/// Date-only layouts, parsed to midnight
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%d %b %Y",
];

/// Layouts carrying a time of day
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y, %I:%M:%S %p",
    "%B %d, %Y, %I:%M %p",
    "%b %d, %Y, %I:%M:%S %p",
    "%b %d, %Y, %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a date string against the standard format table
///
/// Returns the timestamp as `YYYY-MM-DDTHH:MM:SS`, or `None` when no format
/// matches. Date-only inputs normalize to midnight.
pub fn parse_standard_date_formats(date_str: &str) -> Option<String> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Some(midnight.format(ISO_FORMAT).to_string());
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.format(ISO_FORMAT).to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only_formats() {
        assert_eq!(
            parse_standard_date_formats("2024-03-13").as_deref(),
            Some("2024-03-13T00:00:00")
        );
        assert_eq!(
            parse_standard_date_formats("2024/03/13").as_deref(),
            Some("2024-03-13T00:00:00")
        );
        assert_eq!(
            parse_standard_date_formats("March 13, 2024").as_deref(),
            Some("2024-03-13T00:00:00")
        );
        assert_eq!(
            parse_standard_date_formats("13 March 2024").as_deref(),
            Some("2024-03-13T00:00:00")
        );
        assert_eq!(
            parse_standard_date_formats("Mar 13, 2024").as_deref(),
            Some("2024-03-13T00:00:00")
        );
        assert_eq!(
            parse_standard_date_formats("13 Mar 2024").as_deref(),
            Some("2024-03-13T00:00:00")
        );
    }

    #[test]
    fn test_datetime_formats() {
        assert_eq!(
            parse_standard_date_formats("2024-03-13 14:30:05").as_deref(),
            Some("2024-03-13T14:30:05")
        );
        assert_eq!(
            parse_standard_date_formats("2024-03-13 14:30").as_deref(),
            Some("2024-03-13T14:30:00")
        );
        assert_eq!(
            parse_standard_date_formats("March 13, 2024, 02:30:05 PM").as_deref(),
            Some("2024-03-13T14:30:05")
        );
        assert_eq!(
            parse_standard_date_formats("Mar 13, 2024, 02:30 AM").as_deref(),
            Some("2024-03-13T02:30:00")
        );
        assert_eq!(
            parse_standard_date_formats("13 March 2024 14:30:05").as_deref(),
            Some("2024-03-13T14:30:05")
        );
        assert_eq!(
            parse_standard_date_formats("13 Mar 2024 14:30").as_deref(),
            Some("2024-03-13T14:30:00")
        );
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(
            parse_standard_date_formats("  2024-03-13  ").as_deref(),
            Some("2024-03-13T00:00:00")
        );
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_standard_date_formats("yesterday").is_none());
        assert!(parse_standard_date_formats("13/03/2024").is_none());
        assert!(parse_standard_date_formats("").is_none());
    }
}
