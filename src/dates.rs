//! Planning-horizon resolution and in-document deadline scanning.
//!
//! The effective "today" is always passed in explicitly; nothing in this
//! module reads ambient wall-clock time.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use tracing::{debug, warn};

use crate::document::SourceDocument;

/// Horizon used when no valid end date was requested.
pub const DEFAULT_HORIZON_DAYS: u64 = 14;

/// Lines worth scanning for deadlines mention one of these.
static DEADLINE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(exam|final|midterm|due|quiz|test)\b").expect("Invalid regex")
});

/// `Month Day, Year` or `Month Day` (year inferred as the current one).
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:st|nd|rd|th)?(?:,\s*(\d{4}))?",
    )
    .expect("Invalid regex")
});

/// Resolve the requested end date against `today`.
///
/// Missing, malformed, or past dates are replaced with a default horizon;
/// the substitution is logged, never fatal.
pub fn resolve_end_date(today: NaiveDate, requested: Option<&str>) -> NaiveDate {
    if let Some(raw) = requested {
        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(end) if end > today => return end,
            Ok(end) => {
                warn!(requested = %end, %today, "Past or invalid end date, ignoring");
            }
            Err(_) => {
                warn!(requested = raw, "Malformed end date, ignoring");
            }
        }
    }

    let end = today + Days::new(DEFAULT_HORIZON_DAYS);
    warn!(%end, "Defaulting to a {}-day plan", DEFAULT_HORIZON_DAYS);
    end
}

/// Extend `end` to cover any explicit exam/due date found in the documents.
///
/// Only lines that mention a deadline keyword are scanned, so a syllabus
/// full of lecture dates does not balloon the horizon.
pub fn extend_for_exam_dates(
    end: NaiveDate,
    today: NaiveDate,
    documents: &[SourceDocument],
) -> NaiveDate {
    let latest = documents
        .iter()
        .flat_map(|doc| scan_deadlines(&doc.text, today))
        .max();

    match latest {
        Some(deadline) if deadline > end => {
            warn!(%end, %deadline, "Extending horizon to cover an in-document deadline");
            deadline
        }
        _ => end,
    }
}

/// Dates found on deadline-keyword lines of `text`.
pub(crate) fn scan_deadlines(text: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for line in text.lines() {
        if !DEADLINE_LINE.is_match(line) {
            continue;
        }
        for captures in DATE_PATTERN.captures_iter(line) {
            let month = match month_number(&captures[1]) {
                Some(month) => month,
                None => continue,
            };
            let day: u32 = match captures[2].parse() {
                Ok(day) => day,
                Err(_) => continue,
            };
            let year: i32 = captures
                .get(3)
                .and_then(|y| y.as_str().parse().ok())
                .unwrap_or_else(|| today.year());

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                debug!(%date, line, "Found deadline candidate");
                dates.push(date);
            }
        }
    }
    dates
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_keeps_valid_future_date() {
        let today = date(2026, 3, 1);
        assert_eq!(
            resolve_end_date(today, Some("2026-03-20")),
            date(2026, 3, 20)
        );
    }

    #[test]
    fn test_resolve_defaults_on_missing_date() {
        let today = date(2026, 3, 1);
        assert_eq!(resolve_end_date(today, None), date(2026, 3, 15));
    }

    #[test]
    fn test_resolve_defaults_on_past_date() {
        let today = date(2026, 3, 1);
        assert_eq!(
            resolve_end_date(today, Some("2026-02-01")),
            date(2026, 3, 15)
        );
        // Today itself is not a usable horizon either.
        assert_eq!(
            resolve_end_date(today, Some("2026-03-01")),
            date(2026, 3, 15)
        );
    }

    #[test]
    fn test_resolve_defaults_on_malformed_date() {
        let today = date(2026, 3, 1);
        assert_eq!(
            resolve_end_date(today, Some("March 20th")),
            date(2026, 3, 15)
        );
    }

    #[test]
    fn test_scan_finds_month_day_year() {
        let today = date(2026, 3, 1);
        let dates = scan_deadlines("Final exam: December 15, 2026 in MC 4020", today);
        assert_eq!(dates, vec![date(2026, 12, 15)]);
    }

    #[test]
    fn test_scan_infers_current_year() {
        let today = date(2026, 3, 1);
        let dates = scan_deadlines("Midterm on April 3rd, covering Ch 1-6", today);
        assert_eq!(dates, vec![date(2026, 4, 3)]);
    }

    #[test]
    fn test_scan_ignores_non_deadline_lines() {
        let today = date(2026, 3, 1);
        let dates = scan_deadlines("Lecture 12: March 9\nReading week: March 16", today);
        assert!(dates.is_empty());
    }

    #[test]
    fn test_scan_skips_impossible_dates() {
        let today = date(2026, 3, 1);
        let dates = scan_deadlines("Quiz due February 31", today);
        assert!(dates.is_empty());
    }

    #[test]
    fn test_extend_covers_later_deadline() {
        let today = date(2026, 3, 1);
        let docs = vec![SourceDocument::new(
            "syllabus.txt",
            "Final exam: March 25, 2026",
        )];
        assert_eq!(
            extend_for_exam_dates(date(2026, 3, 15), today, &docs),
            date(2026, 3, 25)
        );
    }

    #[test]
    fn test_extend_keeps_end_when_deadline_is_earlier() {
        let today = date(2026, 3, 1);
        let docs = vec![SourceDocument::new(
            "syllabus.txt",
            "Final exam: March 10, 2026",
        )];
        assert_eq!(
            extend_for_exam_dates(date(2026, 3, 15), today, &docs),
            date(2026, 3, 15)
        );
    }
}
