//! Coercion of raw cells into dates, text and numbers.
//!
//! Nothing here fails: values that cannot be coerced become an absent date,
//! an empty string or zero.
use crate::spreadsheet::cell::serial_to_datetime;
use crate::spreadsheet::CellValue;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Date text layouts accepted in schedule cells, tried in order.
/// Two-digit year layouts come first: `%Y` also accepts a two-digit year.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%a %b %d %Y",
];

/// Date/time text layouts; only the calendar date is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Coerces a cell to a calendar date.
///
/// Accepts a cell already typed as a date, a numeric date-serial (day 0 is
/// 1899-12-30) or date text in one of the common layouts.
pub fn coerce_date(raw: &CellValue) -> Option<NaiveDate> {
    match raw {
        CellValue::DateTime(value) => Some(value.date()),
        CellValue::Number(serial) => serial_to_datetime(*serial, false).map(|datetime| datetime.date()),
        CellValue::Text(text) => parse_date_text(text),
        _ => None,
    }
}

/// Stringifies and trims a cell; empty cells become an empty string.
pub fn coerce_text(raw: &CellValue) -> String {
    raw.to_string().trim().to_owned()
}

/// Coerces a cell to a number.
///
/// `$` and `,` are stripped from text before parsing. Unparseable or
/// non-finite values yield 0.
pub fn coerce_number(raw: &CellValue) -> f64 {
    let number = match raw {
        CellValue::Number(value) => *value,
        CellValue::Text(text) => parse_number_text(text),
        _ => 0.0,
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats a date as `MM/DD/YYYY`.
pub fn format_us_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

fn parse_number_text(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|character| *character != '$' && *character != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0.0;
    }
    // "inf" and "nan" parse in Rust but are not numbers in a schedule
    if cleaned.chars().any(|character| character.is_ascii_alphabetic() && !matches!(character, 'e' | 'E')) {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.naive_local().date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}
