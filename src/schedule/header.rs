//! Locates the schedule header row inside a grid whose header position is not fixed.
use crate::schedule::coerce::coerce_text;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::RawGrid;

/// A header row must contain a cell equal to this token.
pub const HEADER_MARKER: &str = "MARKETS";

/// A header row must also contain a cell containing at least one of these.
pub const HEADER_KEYWORDS: &[&str] = &[
    "START", "END", "NET", "INVEST", "IMP", "UNITS", "PLACEMENT", "TARGET", "PROPERTY",
];

/// Trimmed, upper-cased text of a cell, as header matching compares it.
pub(crate) fn normalize_header(cell: &CellValue) -> String {
    coerce_text(cell).to_uppercase()
}

/// Returns the index of the top-most row that looks like the schedule header,
/// or `None` when no row qualifies.
pub fn locate_header(grid: &RawGrid) -> Option<usize> {
    (0..grid.len()).find(|&index| is_header_row(grid.row(index)))
}

fn is_header_row(row: &[CellValue]) -> bool {
    let cells: Vec<String> = row.iter().map(normalize_header).collect();
    let has_marker = cells.iter().any(|cell| cell == HEADER_MARKER);
    has_marker
        && cells
            .iter()
            .any(|cell| HEADER_KEYWORDS.iter().any(|keyword| cell.contains(keyword)))
}
