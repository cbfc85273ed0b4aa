//! # Spreadsheet Module
//!
//! Reads Office Open XML workbooks (`.xlsx`, `.xlsm`) and legacy Excel 97-2003
//! workbooks (`.xls`) into dense grids of raw cell values, and rewrites the data
//! rows of a worksheet inside an existing workbook package. Everything about the
//! binary document formats lives here; the schedule pipeline only sees
//! [`Workbook`], [`RawGrid`] and [`CellValue`].
use thiserror::Error;

pub mod cell;
pub(crate) mod excel;
pub mod grid;
pub(crate) mod reference;
pub mod workbook;
pub mod writer;
pub mod xls;
pub mod xlsx;

pub use cell::CellValue;
pub use grid::RawGrid;
pub use workbook::Workbook;
pub use writer::OutputValue;
pub use xls::XlsWorkbook;
pub use xlsx::XlsxWorkbook;

/// Errors raised while reading or rewriting workbook packages.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// A required part is missing from the package
    #[error("Workbook part '{0}' not found")]
    FileError(String),

    /// Neither a workbook package nor a readable legacy workbook
    #[error("Unsupported spreadsheet format: '{0}'")]
    UnsupportedFormat(String),

    /// The named worksheet does not exist
    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFound(String, String),
}
