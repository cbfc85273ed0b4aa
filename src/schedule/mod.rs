//! # Schedule Module
//!
//! Turns the raw grid of a media schedule into classified [`NormalizedLine`]s:
//! the header row is located, its columns are mapped to canonical fields, the
//! rows below it are coerced and filtered, and each surviving row is routed to
//! a [`DestinationCategory`].
//!
//! Malformed values never fail here. They degrade to defaults or skip the row.
pub mod classify;
pub mod coerce;
pub mod columns;
pub mod extract;
pub mod header;

pub use classify::classify;
pub use classify::DestinationCategory;
pub use classify::DEFAULT_CATEGORY;
pub use columns::map_columns;
pub use columns::CanonicalField;
pub use columns::ColumnIndexMap;
pub use extract::extract_rows;
pub use extract::ExtractedRow;
pub use extract::ExtractionStats;
pub use header::locate_header;

use crate::spreadsheet::RawGrid;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;
use tracing::warn;

/// A classified schedule line, ready for projection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizedLine {
    pub category: DestinationCategory,
    pub market: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub line_item_name: String,
    /// Non-negative
    pub net_investment: f64,
    /// Non-negative
    pub quantity: f64,
    pub targeting: String,
    /// 0-based row of the source grid, diagnostics only
    pub source_row_index: usize,
}

impl NormalizedLine {
    pub fn new(row: ExtractedRow, category: DestinationCategory) -> Self {
        Self {
            category,
            market: row.market,
            start_date: row.start_date,
            end_date: row.end_date,
            line_item_name: row.line_item_name,
            net_investment: row.net_investment,
            quantity: row.quantity,
            targeting: row.targeting,
            source_row_index: row.source_row_index,
        }
    }
}

/// Why a schedule produced no lines. None of these is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ExtractionIssue {
    /// The document has no worksheet
    NoSheet,
    NoHeaderFound,
    NoMarketColumn,
    /// A header was found but every row was skipped
    NoLines,
}

impl Display for ExtractionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::NoSheet => "document has no worksheet",
            Self::NoHeaderFound => "no schedule header row found",
            Self::NoMarketColumn => "header row has no market column",
            Self::NoLines => "no schedule lines found",
        };
        f.write_str(message)
    }
}

/// Result of reading one schedule grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Schedule {
    pub header_row: Option<usize>,
    pub columns: ColumnIndexMap,
    pub lines: Vec<NormalizedLine>,
    pub stats: ExtractionStats,
    pub issue: Option<ExtractionIssue>,
}

impl Schedule {
    /// A schedule with no lines for the given reason.
    pub fn empty(issue: ExtractionIssue) -> Self {
        Self {
            issue: Some(issue),
            ..Self::default()
        }
    }
}

/// Reads and classifies every line of a schedule grid. Rows that neither their
/// own text nor the file name route go to `default_category`.
pub fn read_schedule(grid: &RawGrid, file_name: &str, default_category: DestinationCategory) -> Schedule {
    let Some(header_row) = locate_header(grid) else {
        warn!(file_name, sheet = grid.name(), "{}", ExtractionIssue::NoHeaderFound);
        return Schedule::empty(ExtractionIssue::NoHeaderFound);
    };
    let columns = map_columns(grid.row(header_row));
    if !columns.contains(CanonicalField::Market) {
        warn!(file_name, header_row, "{}", ExtractionIssue::NoMarketColumn);
        return Schedule {
            header_row: Some(header_row),
            columns,
            ..Schedule::empty(ExtractionIssue::NoMarketColumn)
        };
    }

    let extraction = extract_rows(grid, header_row, &columns);
    let lines: Vec<NormalizedLine> = extraction
        .rows
        .into_iter()
        .map(|row| {
            let category = classify(&row, file_name, default_category);
            NormalizedLine::new(row, category)
        })
        .collect();
    let issue = if lines.is_empty() {
        warn!(file_name, header_row, "{}", ExtractionIssue::NoLines);
        Some(ExtractionIssue::NoLines)
    } else {
        None
    };
    Schedule {
        header_row: Some(header_row),
        columns,
        lines,
        stats: extraction.stats,
        issue,
    }
}
