use crate::error::ConverterError;
use crate::helpers::cfb;
use crate::spreadsheet::grid::RawGrid;
use crate::spreadsheet::xls::XlsWorkbook;
use crate::spreadsheet::xlsx::XlsxWorkbook;

/// An input workbook in either of the supported formats.
///
/// The format is detected from the content, not the file extension:
/// compound files are legacy Excel 97-2003 workbooks, anything else must be
/// an Office Open XML package.
pub enum Workbook {
    /// Excel 2007+ package (.xlsx, .xlsm)
    Xlsx(XlsxWorkbook),
    /// Legacy Excel 97-2003 workbook (.xls)
    Xls(XlsWorkbook),
}

impl Workbook {
    /// Opens a workbook held in memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Workbook, ConverterError> {
        if bytes.starts_with(&cfb::SIGNATURE) {
            Ok(Workbook::Xls(XlsWorkbook::from_bytes(name, bytes)?))
        } else {
            Ok(Workbook::Xlsx(XlsxWorkbook::from_bytes(name, bytes)?))
        }
    }

    /// Source name the workbook was opened with
    pub fn name(&self) -> &str {
        match self {
            Workbook::Xlsx(workbook) => workbook.name(),
            Workbook::Xls(workbook) => workbook.name(),
        }
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        match self {
            Workbook::Xlsx(workbook) => workbook.sheet_names(),
            Workbook::Xls(workbook) => workbook.sheet_names(),
        }
    }

    /// Reads the first worksheet, or `None` when the workbook has no worksheets
    pub fn first_sheet(&mut self) -> Result<Option<RawGrid>, ConverterError> {
        match self {
            Workbook::Xlsx(workbook) => workbook.first_sheet(),
            Workbook::Xls(workbook) => workbook.first_sheet(),
        }
    }

    /// Reads a worksheet by name (case-insensitive)
    pub fn sheet(&mut self, sheet_name: &str) -> Result<RawGrid, ConverterError> {
        match self {
            Workbook::Xlsx(workbook) => workbook.sheet(sheet_name),
            Workbook::Xls(workbook) => workbook.sheet(sheet_name),
        }
    }
}
