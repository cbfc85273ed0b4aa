use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// Milliseconds in one day of a date-serial.
const MILLISECONDS_PER_DAY: f64 = 86_400_000.0;

/// How a raw `<c>` element should be decoded, derived from its `t` and `s` attributes.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Numbers formatted as a date or date/time, 1900 date system
    NumberDate1900,
    /// Numbers formatted as a date or date/time, 1904 date system
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    /// Time-only formats stay numeric: a time of day is not a schedule date.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "22" => Some(Self::date(is_1904)),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date patterns outside literals and brackets.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::date(is_1904)
        } else {
            Self::Number
        }
    }

    fn date(is_1904: bool) -> Self {
        if is_1904 {
            Self::NumberDate1904
        } else {
            Self::NumberDate1900
        }
    }
}

/// A decoded cell value. This is the untyped "raw cell" the schedule pipeline coerces.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
    /// Spreadsheet error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    /// Decodes the raw `<v>`/`<is>` text of a cell according to its type.
    /// Values that do not match their declared type fall back to text.
    pub(crate) fn decode(kind: CellType, value: String, shared_strings: &[String]) -> Self {
        match kind {
            CellType::Empty => Self::Empty,
            CellType::Boolean => Self::Bool(value.trim() == "1" || value.eq_ignore_ascii_case("true")),
            CellType::Number => match value.trim().parse::<f64>() {
                Ok(number) => Self::Number(number),
                Err(_) => Self::Text(value),
            },
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                let is_1904 = kind == CellType::NumberDate1904;
                match value.trim().parse::<f64>().ok().and_then(|serial| serial_to_datetime(serial, is_1904)) {
                    Some(datetime) => Self::DateTime(datetime),
                    None => Self::Text(value),
                }
            }
            CellType::IsoDateTime => match parse_iso_datetime(&value) {
                Some(datetime) => Self::DateTime(datetime),
                None => Self::Text(value),
            },
            CellType::InlineString => Self::Text(value),
            CellType::SharedString => value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .map(|string| Self::Text(string.to_owned()))
                .unwrap_or(Self::Empty),
            CellType::Error => Self::Error(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        Self::DateTime(value.and_time(chrono::NaiveTime::MIN))
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            Self::Number(value) => write!(f, "{}", format_number(*value)),
            Self::DateTime(value) if value.time() == chrono::NaiveTime::MIN => {
                write!(f, "{}", value.date().format("%Y-%m-%d"))
            }
            Self::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Self::Text(value) | Self::Error(value) => write!(f, "{}", value),
        }
    }
}

/// Text of a binary error code, as stored by legacy workbooks.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// Formats a number the way spreadsheet text renders it: integers without a fraction.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Converts a date-serial to a date/time.
/// Day 0 is 1899-12-30 (1904-01-01 in the 1904 date system); the fraction is the time of day.
pub fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let milliseconds = (serial * MILLISECONDS_PER_DAY).round();
    if milliseconds.abs() > i64::MAX as f64 {
        return None;
    }
    epoch
        .and_time(chrono::NaiveTime::MIN)
        .checked_add_signed(Duration::try_milliseconds(milliseconds as i64)?)
}

/// Parses ISO 8601 date or date/time text as written in `t="d"` cells.
fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(|date| date.and_time(chrono::NaiveTime::MIN)))
}
