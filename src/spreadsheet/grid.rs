use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::is_within_sheet;

/// The first sheet of a document as a dense, read-only grid of raw cells.
///
/// Row `i` of the grid is sheet row `i` (0-based): rows the file never mentions
/// are present as empty rows, and cells past the end of a row read as `Empty`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawGrid {
    /// Source sheet name
    pub(crate) name: String,
    rows: Vec<Vec<CellValue>>,
}

static EMPTY: CellValue = CellValue::Empty;

impl RawGrid {
    /// Creates an empty grid for the named sheet.
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rows: Vec::new(),
        }
    }

    /// Builds a grid from rows already in memory.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = CellValue>,
    {
        Self {
            name: String::new(),
            rows: rows.into_iter().map(|row| row.into_iter().collect()).collect(),
        }
    }

    /// Places a cell, growing the grid as needed. Empty values do not grow it,
    /// and positions outside the worksheet limits are dropped.
    pub(crate) fn push(&mut self, row: usize, col: usize, value: CellValue) {
        if value.is_empty() || !is_within_sheet(row, col) {
            return;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }

    /// Sheet name the grid was read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows, including empty rows before the last populated one.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of a row; rows past the end are empty.
    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A single cell; positions outside the populated area are `Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(&EMPTY)
    }

    /// Widest populated row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}
