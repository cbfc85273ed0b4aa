use crate::error::ConverterError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::excel;
use crate::spreadsheet::grid::RawGrid;
use crate::spreadsheet::SpreadsheetError;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

// BIFF8 record type identifiers
const FORMULA: u16 = 6;          // Formula with its cached result
const EOF: u16 = 10;             // End of a substream
const DATE1904: u16 = 34;        // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;       // Encryption of the rest of the stream
const CODE_PAGE: u16 = 66;       // Code page of 8-bit strings
const BOUND_SHEET8: u16 = 133;   // Sheet name, kind and stream position
const MUL_RK: u16 = 189;         // Run of RK numbers in one row
const XF: u16 = 224;             // Extended format, links a cell to its number format
const SST: u16 = 252;            // Shared string table
const LABEL_SST: u16 = 253;      // Cell referencing the shared string table
const NUMBER: u16 = 515;         // Numeric cell
const LABEL: u16 = 516;          // Text cell with inline string
const BOOL_ERR: u16 = 517;       // Boolean or error cell
const STRING: u16 = 519;         // String result of the preceding formula
const ARRAY: u16 = 545;          // Array formula, may precede STRING
const TABLE: u16 = 566;          // Data table formula, may precede STRING
const RK: u16 = 638;             // Compressed numeric cell
const FORMAT: u16 = 1054;        // Custom number format definition
const SHARED_FORMULA: u16 = 1212; // Shared formula, may precede STRING
const BOF: u16 = 2057;           // Beginning of a substream

/// Sheet kind of a worksheet in BOUND_SHEET8; charts and macro sheets are skipped
const SHEET_KIND_WORKSHEET: u8 = 0;

/// Error types specific to XLS file parsing
#[derive(Error, Debug)]
pub enum XlsError {
    /// Invalid character encoding code page encountered
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    /// Invalid formula value or structure encountered
    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),
}

/// A legacy Excel 97-2003 workbook opened for reading cell values
pub struct XlsWorkbook {
    /// File name used in messages
    pub(crate) name: String,
    /// BIFF8 reader over the workbook stream
    reader: Biff8Reader,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Parsed number formats for date detection, indexed by XF record
    number_formats: Vec<CellType>,
    /// Worksheets with their substream positions
    sheets: Vec<(String, usize)>,
}

impl XlsWorkbook {
    /// Opens a workbook held in memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsWorkbook, ConverterError> {
        let cfb = Cfb::new(bytes)?;
        // Encrypted Office Open XML packages are compound files without a workbook stream
        let stream = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .ok_or_else(|| SpreadsheetError::UnsupportedFormat(name.to_owned()))?;
        Self::from_stream(name, stream)
    }

    /// Reads the workbook globals substream: code page, formats, shared strings and sheets
    fn from_stream(name: &str, stream: Vec<u8>) -> Result<XlsWorkbook, ConverterError> {
        let mut reader = Biff8Reader::new(stream);
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, String> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::UnsupportedFormat(name.to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), format);
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let kind = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if kind == SHEET_KIND_WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });

        // DATE1904 may follow the formats, so they are classified once the globals are read
        let custom_formats = custom_formats
            .into_iter()
            .map(|(id, format)| (id, CellType::parse_custom_number_format(&format, is_1904)))
            .collect();
        let number_formats = excel::load_number_formats(format_indexes, custom_formats, is_1904);
        debug!(workbook = name, sheets = sheets.len(), is_1904, "opened legacy workbook");

        Ok(XlsWorkbook {
            name: name.to_owned(),
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads the first worksheet, or `None` when the workbook has no worksheets
    pub fn first_sheet(&mut self) -> Result<Option<RawGrid>, ConverterError> {
        match self.sheets.first().cloned() {
            Some((sheet_name, pointer)) => self.read_grid(&sheet_name, pointer).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a worksheet by name (case-insensitive)
    pub fn sheet(&mut self, sheet_name: &str) -> Result<RawGrid, ConverterError> {
        let (name, pointer) = self.sheets
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sheet_name))
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFound(self.name.to_owned(), sheet_name.to_owned()))?;
        self.read_grid(&name, pointer)
    }

    /// Source name the workbook was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parses the cell records of a worksheet substream into a grid
    fn read_grid(&mut self, sheet_name: &str, pointer: usize) -> Result<RawGrid, ConverterError> {
        let mut grid = RawGrid::new(sheet_name);
        self.reader.goto(pointer);
        if self.reader.next()? != Some(BOF) {
            Err(SpreadsheetError::FileError(format!("{}: {}", self.name, sheet_name)))?
        }
        while let Some(record) = self.reader.next()? {
            match record {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let first_col = self.reader.read_u16()? as usize;
                    let last_col = self.reader.read_last_u16()? as usize;
                    for col in first_col..=last_col {
                        let index = self.reader.read_u16()? as usize;
                        let value = self.reader.read_rk_number()?.to_string();
                        let kind = number_format(&self.number_formats, index);
                        grid.push(row, col, CellValue::decode(kind, value, &self.shared_strings));
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (kind, value) = match record {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader, &self.number_formats)?,
                        RK => read_rk_cell(&mut self.reader, &self.number_formats)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader, &self.number_formats)?,
                    };
                    if !value.is_empty() {
                        grid.push(row, col, CellValue::decode(kind, value, &self.shared_strings));
                    }
                }
                _ => (),
            }
        }
        debug!(workbook = %self.name, sheet = sheet_name, rows = grid.len(), "read legacy worksheet");
        Ok(grid)
    }
}

/// Cell type of the XF record at `index`; unknown indexes read as plain numbers
fn number_format(number_formats: &[CellType], index: usize) -> CellType {
    number_formats.get(index).copied().unwrap_or(CellType::Number)
}

/// Loads the shared string table from the SST record and its continuations
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, ConverterError> {
    reader.skip(4)?;
    let count = reader.read_usize()?;
    let mut shared_strings: Vec<String> = Vec::new();
    for _ in 0..count {
        let string = reader.read_xl_unicode_rich_extended_string()?;
        shared_strings.push(string);
    }
    Ok(shared_strings)
}

/// Reads a BOOL_ERR record: a boolean, or an error code
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), ConverterError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let is_error = reader.read_u8()? != 0;
    Ok(if is_error {
        (CellType::Error, to_error_value(value).to_owned())
    } else {
        (CellType::Boolean, value.to_string())
    })
}

/// Reads a NUMBER record: a double with the XF index that decides date formatting
fn read_number_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), ConverterError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((number_format(number_formats, index), value.to_string()))
}

/// Reads an RK record: a compressed number with its XF index
fn read_rk_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), ConverterError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((number_format(number_formats, index), value.to_string()))
}

/// Reads a LABEL_SST record: an index into the shared string table
fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), ConverterError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((CellType::SharedString, value.to_string()))
}

/// Reads a LABEL record: a string stored in the cell itself
fn read_label_cell(reader: &mut Biff8Reader) -> Result<(CellType, String), ConverterError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((CellType::InlineString, value))
}

/// Reads the cached result of a FORMULA record
///
/// Numbers are stored in place. String results follow in a STRING record,
/// possibly behind the shared, array or table formula they belong to.
fn read_formula_cell(reader: &mut Biff8Reader, number_formats: &[CellType]) -> Result<(CellType, String), ConverterError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((number_format(number_formats, index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        while let Some(record) = reader.next()? {
            match record {
                STRING => return Ok((CellType::InlineString, reader.read_xl_unicode_string()?)),
                SHARED_FORMULA | ARRAY | TABLE => continue,
                _ => break,
            }
        }
        Err(XlsError::FormulaValueError(formula))?
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((CellType::Boolean, value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((CellType::Error, to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((CellType::InlineString, String::new()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}
