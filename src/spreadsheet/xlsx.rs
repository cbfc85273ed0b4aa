use crate::error::ConverterError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::excel;
use crate::spreadsheet::grid::RawGrid;
use crate::spreadsheet::reference::is_within_sheet;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use tracing::debug;
use zip::ZipArchive;

// XML tag names for parsing workbook parts
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// An Office Open XML workbook opened for reading cell values
pub struct XlsxWorkbook {
    /// File name used in messages
    pub(crate) name: String,
    /// ZIP archive containing the workbook parts
    zip: ZipArchive<Cursor<Vec<u8>>>,
    /// Parsed number formats for date detection, indexed by style id
    number_formats: Vec<CellType>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// List of worksheets with (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl XlsxWorkbook {
    /// Opens a workbook held in memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<XlsxWorkbook, ConverterError> {
        let (mut zip, sheets, is_1904) = excel::open(name, bytes)?;
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        debug!(workbook = name, sheets = sheets.len(), is_1904, "opened workbook");
        Ok(XlsxWorkbook {
            name: name.to_owned(),
            zip,
            number_formats,
            shared_strings,
            sheets,
        })
    }

    /// Worksheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Package path of a worksheet by name (case-insensitive)
    pub(crate) fn sheet_path(&self, sheet_name: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sheet_name))
            .map(|(_, zip_path)| zip_path.as_str())
    }

    /// Reads the first worksheet, or `None` when the workbook has no worksheets
    pub fn first_sheet(&mut self) -> Result<Option<RawGrid>, ConverterError> {
        match self.sheets.first().cloned() {
            Some((sheet_name, zip_path)) => self.read_grid(&sheet_name, &zip_path).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a worksheet by name (case-insensitive)
    pub fn sheet(&mut self, sheet_name: &str) -> Result<RawGrid, ConverterError> {
        let (name, zip_path) = self.sheets
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sheet_name))
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFound(self.name.to_owned(), sheet_name.to_owned()))?;
        self.read_grid(&name, &zip_path)
    }

    /// Source name the workbook was opened with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parses a worksheet part into a grid
    fn read_grid(&mut self, sheet_name: &str, zip_path: &str) -> Result<RawGrid, ConverterError> {
        let mut grid = RawGrid::new(sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut is_in_sheet = false;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self.zip.xml_reader(zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW.as_ref() => {
                if let Some(number) = event.get_attribute_value("r")? {
                    row_count = row_to_index(&number).unwrap_or(MAX_ROWS);
                }
                col_count = 0;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW.as_ref() => {
                row_count += 1;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL.as_ref() => {
                let position = match event.get_attribute_value("r")? {
                    Some(reference) => reference_to_index(&reference),
                    None => Some((row_count, col_count)),
                };
                is_in_sheet = match position {
                    Some((cell_row, cell_col)) if is_within_sheet(cell_row, cell_col) => {
                        (row, col) = (cell_row, cell_col);
                        col_count = col + 1;
                        true
                    }
                    _ => {
                        debug!(workbook = %self.name, sheet = sheet_name, "skipped cell outside the worksheet");
                        false
                    }
                };
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if let Some(format_id) = event.get_attribute_value("s")? {
                    if kind == CellType::Number && !format_id.is_empty() {
                        let index = format_id.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
                value.clear();
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING.as_ref() => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_VALUE.as_ref() => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL.as_ref() => {
                if is_in_sheet && !value.is_empty() {
                    let cell = CellValue::decode(kind, std::mem::take(&mut value), &self.shared_strings);
                    grid.push(row, col, cell);
                }
                kind = CellType::default();
            }
        });
        debug!(workbook = %self.name, sheet = sheet_name, rows = grid.len(), "read worksheet");
        Ok(grid)
    }
}

/// Loads the shared string table, or an empty table when the part is absent
fn load_shared_strings(zip: &mut ZipArchive<Cursor<Vec<u8>>>) -> Result<Vec<String>, ConverterError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM.as_ref() => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Loads number formats and cell styles from `xl/styles.xml`
///
/// Parses custom number formats and cell style indexes to determine
/// which numeric values are dates.
///
/// # Returns
/// Vector of CellType values indexed by style ID
fn load_number_formats(zip: &mut ZipArchive<Cursor<Vec<u8>>>, is_1904: bool) -> Result<Vec<CellType>, ConverterError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();

    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS.as_ref() => {
            custom_formats_context = true;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS.as_ref() => {
            custom_formats_context = false;
        }
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT.as_ref() => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }

        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES.as_ref() => {
            format_indexes_context = true;
        }
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES.as_ref() => {
            format_indexes_context = false;
        }
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX.as_ref() => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Skips phonetic text annotations and concatenates rich text runs.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, ConverterError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag.as_ref() => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT.as_ref() => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT.as_ref() => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT.as_ref() => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT.as_ref() => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
