//! Text normalization helpers shared by the board layouts.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{AppError, Result};

/// Literal token written in place of line breaks in notice bodies.
pub const NEWLINE_TOKEN: &str = "\\n";

const NBSP: char = '\u{a0}';

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{4})\s*[-./]\s*(\d{1,2})\s*[-./]\s*(\d{1,2})").expect("valid date regex")
    })
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a date in the boards' `M월D일` display form.
pub fn month_day(date: NaiveDate) -> String {
    format!("{}월{}일", date.month(), date.day())
}

/// Normalize a listing date cell (`2024-03-05`, `2024.03.05`, ...) to `M월D일`.
pub fn normalize_date(raw: &str) -> Result<String> {
    let caps = date_pattern()
        .captures(raw)
        .ok_or_else(|| AppError::parse("date", format!("unrecognized date '{}'", raw.trim())))?;

    let field = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
    let year = caps[1].parse::<i32>().unwrap_or(0);
    NaiveDate::from_ymd_opt(year, field(2), field(3))
        .map(month_day)
        .ok_or_else(|| AppError::parse("date", format!("invalid date '{}'", raw.trim())))
}

/// Normalize one paragraph of notice body text.
///
/// Non-breaking spaces become plain spaces, each line is whitespace-collapsed,
/// blank lines are dropped and the remaining lines are joined with
/// [`NEWLINE_TOKEN`]. Returns `None` when nothing is left.
pub fn normalize_paragraph(raw: &str) -> Option<String> {
    let folded = raw.replace(NBSP, " ");
    let lines: Vec<String> = folded
        .lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(NEWLINE_TOKEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_date_variants() {
        assert_eq!(normalize_date("2024-03-05").unwrap(), "3월5일");
        assert_eq!(normalize_date(" 2024.12.25 ").unwrap(), "12월25일");
        assert_eq!(normalize_date("2023/10/01 09:30").unwrap(), "10월1일");
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert!(normalize_date("어제").is_err());
        assert!(normalize_date("2024-02-30").is_err());
    }

    #[test]
    fn test_month_day() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert_eq!(month_day(date), "1월9일");
    }

    #[test]
    fn test_normalize_paragraph() {
        assert_eq!(
            normalize_paragraph("  수강\u{a0}신청  안내\n\n일정   참고 "),
            Some("수강 신청 안내\\n일정 참고".to_string())
        );
        assert_eq!(normalize_paragraph("\u{a0}"), None);
        assert_eq!(normalize_paragraph(""), None);
    }
}
