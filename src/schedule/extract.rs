//! Walks the data rows below the header and emits normalized, unclassified records.
use crate::schedule::coerce::coerce_date;
use crate::schedule::coerce::coerce_number;
use crate::schedule::coerce::coerce_text;
use crate::schedule::coerce::format_iso_date;
use crate::schedule::columns::CanonicalField;
use crate::schedule::columns::ColumnIndexMap;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::RawGrid;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Consecutive rows without a market that end extraction.
pub const EMPTY_MARKET_LIMIT: usize = 20;

/// Rows whose property equals this (case-insensitive) are excluded.
pub const EXCLUDED_PROPERTY: &str = "ampersand";

/// A schedule row after coercion, before it has been assigned a category.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtractedRow {
    pub market: String,
    pub property: String,
    pub placement: String,
    pub targeting: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub line_item_name: String,
    pub net_investment: f64,
    pub quantity: f64,
    /// 0-based row of the source grid
    pub source_row_index: usize,
}

/// Counters describing what extraction skipped and why.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Rows below the header that were examined
    pub rows_scanned: usize,
    pub skipped_empty_market: usize,
    pub skipped_excluded_property: usize,
    pub skipped_missing_dates: usize,
    /// Row at which the empty-market limit stopped extraction
    pub stopped_at_row: Option<usize>,
}

/// Extracted rows plus the statistics of the walk that produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    pub rows: Vec<ExtractedRow>,
    pub stats: ExtractionStats,
}

/// Extracts every data row strictly below `header_row`.
///
/// Returns nothing when the column map has no market column. Rows are either
/// emitted whole or skipped whole.
pub fn extract_rows(grid: &RawGrid, header_row: usize, columns: &ColumnIndexMap) -> Extraction {
    let mut extraction = Extraction::default();
    let Some(market_column) = columns.get(CanonicalField::Market) else {
        return extraction;
    };

    let mut empty_market_run = 0usize;
    for index in header_row + 1..grid.len() {
        let row = grid.row(index);
        extraction.stats.rows_scanned += 1;

        let market = text_at(row, Some(market_column));
        if market.is_empty() {
            empty_market_run += 1;
            extraction.stats.skipped_empty_market += 1;
            if empty_market_run >= EMPTY_MARKET_LIMIT {
                debug!(row = index, "empty market limit reached, stopping");
                extraction.stats.stopped_at_row = Some(index);
                break;
            }
            continue;
        }
        empty_market_run = 0;

        let property = text_at(row, columns.get(CanonicalField::Property));
        if property.eq_ignore_ascii_case(EXCLUDED_PROPERTY) {
            debug!(row = index, property = %property, "excluded property");
            extraction.stats.skipped_excluded_property += 1;
            continue;
        }

        let start = cell_at(row, columns.get(CanonicalField::StartDate)).and_then(coerce_date);
        let end = cell_at(row, columns.get(CanonicalField::EndDate)).and_then(coerce_date);
        let (start_date, end_date) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, start),
            (None, Some(end)) => (end, end),
            (None, None) => {
                debug!(row = index, market = %market, "no usable start or end date");
                extraction.stats.skipped_missing_dates += 1;
                continue;
            }
        };

        let placement = text_at(row, columns.get(CanonicalField::Placement));
        let targeting = text_at(row, columns.get(CanonicalField::Target));
        let quantity = number_at(row, columns.get(CanonicalField::ImpressionsOrUnits));
        let net_investment = number_at(row, columns.get(CanonicalField::NetInvestment));
        let line_item_name = if placement.is_empty() {
            synthesize_line_item_name(&market, start_date, end_date)
        } else {
            placement.clone()
        };

        extraction.rows.push(ExtractedRow {
            market,
            property,
            placement,
            targeting,
            start_date,
            end_date,
            line_item_name,
            net_investment,
            quantity,
            source_row_index: index,
        });
    }
    debug!(rows = extraction.rows.len(), stats = ?extraction.stats, "extracted rows");
    extraction
}

/// Label used when a row has no placement: market followed by the ISO date range.
pub fn synthesize_line_item_name(market: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{} {}\u{2013}{}", market, format_iso_date(start), format_iso_date(end))
}

fn cell_at(row: &[CellValue], column: Option<usize>) -> Option<&CellValue> {
    column.and_then(|column| row.get(column))
}

fn text_at(row: &[CellValue], column: Option<usize>) -> String {
    cell_at(row, column).map(coerce_text).unwrap_or_default()
}

/// Numeric cell, 0 when the column is absent; negative amounts are clamped to 0.
fn number_at(row: &[CellValue], column: Option<usize>) -> f64 {
    cell_at(row, column).map(coerce_number).unwrap_or(0.0).max(0.0)
}
