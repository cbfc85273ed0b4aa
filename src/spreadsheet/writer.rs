//! Rewrites the data rows of one worksheet inside an existing workbook package.
//!
//! The package is treated as an immutable snapshot: every part except the target
//! worksheet is raw-copied, and the worksheet XML is streamed through unchanged
//! up to and including the header row. Rows below it are dropped and the new
//! rows are written in their place.
use crate::error::ConverterError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::format_number;
use crate::spreadsheet::reference::index_to_col;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

const TAG_SHEET_DATA: &[u8] = b"sheetData";
const TAG_DIMENSION: &[u8] = b"dimension";
const TAG_ROW: &[u8] = b"row";
const TAG_MERGE_CELLS: &[u8] = b"mergeCells";
const TAG_MERGE_CELL: &[u8] = b"mergeCell";

/// A value written into an output cell.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputValue {
    Text(String),
    Number(f64),
}

impl OutputValue {
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Text(value.into())
    }
}

/// A `<mergeCells>` element held back until its surviving children are known.
struct MergeCells {
    element: BytesStart<'static>,
    events: Vec<Event<'static>>,
    kept: usize,
}

impl MergeCells {
    /// Writes the element with its `count` updated, or nothing when every merge was dropped.
    fn write<W: Write>(self, writer: &mut Writer<W>, end: Event) -> Result<(), ConverterError> {
        if self.kept == 0 {
            return Ok(());
        }
        let element = replace_attribute(&self.element, b"count", &self.kept.to_string())?;
        writer.write_event(Event::Start(element))?;
        for event in self.events {
            writer.write_event(event)?;
        }
        writer.write_event(end)?;
        Ok(())
    }
}

/// Replaces every row strictly below `header_row_index` (0-based) of the worksheet
/// stored at `zip_path`, returning the bytes of the new package.
pub(crate) fn replace_sheet_rows(
    template: &[u8],
    zip_path: &str,
    header_row_index: usize,
    rows: &[Vec<OutputValue>],
) -> Result<Vec<u8>, ConverterError> {
    let mut zip = ZipArchive::new(Cursor::new(template))?;
    let entry = zip.entry_name(zip_path)
        .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
    let sheet_xml = zip.read_bytes(&entry)?
        .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
    let rewritten = rewrite_sheet_xml(&sheet_xml, header_row_index, rows)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(template.len())));
    for index in 0..zip.len() {
        let file = zip.by_index_raw(index)?;
        if file.name() == entry {
            let method = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default().compression_method(method);
            if let Some(modified) = file.last_modified() {
                options = options.last_modified_time(modified);
            }
            drop(file);
            writer.start_file(entry.as_str(), options)?;
            writer.write_all(&rewritten)?;
        } else {
            writer.raw_copy_file(file)?;
        }
    }
    Ok(writer.finish()?.into_inner())
}

/// Streams worksheet XML, keeping rows up to `header_row_index` and appending `rows`.
/// Merged ranges that start below the kept rows are dropped with them.
pub(crate) fn rewrite_sheet_xml(
    xml: &[u8],
    header_row_index: usize,
    rows: &[Vec<OutputValue>],
) -> Result<Vec<u8>, ConverterError> {
    // 1-based row numbers at or below this survive
    let kept_rows = header_row_index + 1;
    let mut reader = XmlReader::preserving(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skip_depth = 0usize;
    let mut row_number = 0usize;
    let mut in_sheet_data = false;
    let mut prefix = String::new();
    let mut merge_cells = None::<MergeCells>;

    while let Some(event) = reader.next()? {
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => (),
            }
            continue;
        }
        if merge_cells.is_some() {
            match event {
                Event::End(ref element) if element.local_name().as_ref() == TAG_MERGE_CELLS => {
                    if let Some(buffered) = merge_cells.take() {
                        buffered.write(&mut writer, event)?;
                    }
                }
                Event::Start(ref element) | Event::Empty(ref element)
                    if element.local_name().as_ref() == TAG_MERGE_CELL =>
                {
                    if starts_within(element, kept_rows)? {
                        if let Some(buffered) = merge_cells.as_mut() {
                            buffered.kept += 1;
                            buffered.events.push(event.into_owned());
                        }
                    } else if matches!(event, Event::Start(_)) {
                        skip_depth = 1;
                    }
                }
                _ => {
                    if let Some(buffered) = merge_cells.as_mut() {
                        buffered.events.push(event.into_owned());
                    }
                }
            }
            continue;
        }
        match event {
            Event::Start(ref element) if element.local_name().as_ref() == TAG_MERGE_CELLS => {
                merge_cells = Some(MergeCells {
                    element: element.clone().into_owned(),
                    events: Vec::new(),
                    kept: 0,
                });
            }
            Event::Start(ref element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                in_sheet_data = true;
                prefix = element_prefix(element);
                writer.write_event(event)?;
            }
            Event::Empty(ref element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                prefix = element_prefix(element);
                writer.write_event(Event::Start(element.clone()))?;
                write_rows(&mut writer, &prefix, header_row_index + 1, rows)?;
                writer.write_event(Event::End(element.to_end()))?;
            }
            Event::End(ref element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                in_sheet_data = false;
                write_rows(&mut writer, &prefix, header_row_index + 1, rows)?;
                writer.write_event(event)?;
            }
            Event::Start(ref element) | Event::Empty(ref element)
                if in_sheet_data && element.local_name().as_ref() == TAG_ROW =>
            {
                row_number = element.parse_attribute_value::<usize>("r")?.unwrap_or(row_number + 1);
                if row_number <= kept_rows {
                    writer.write_event(event)?;
                } else if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            Event::Start(ref element) | Event::Empty(ref element)
                if element.local_name().as_ref() == TAG_DIMENSION =>
            {
                let dimension = rewrite_dimension(element, kept_rows, rows)?;
                if matches!(event, Event::Start(_)) {
                    writer.write_event(Event::Start(dimension))?;
                } else {
                    writer.write_event(Event::Empty(dimension))?;
                }
            }
            _ => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

/// Namespace prefix of an element including the colon, e.g. `x:`; empty when unprefixed.
fn element_prefix(element: &BytesStart) -> String {
    let name = element.name();
    let full = name.as_ref();
    let local = element.local_name().as_ref().len();
    String::from_utf8_lossy(&full[..full.len() - local]).into_owned()
}

/// Recomputes the `ref` of `<dimension>` for the kept rows plus the written rows.
fn rewrite_dimension(
    element: &BytesStart,
    kept_rows: usize,
    rows: &[Vec<OutputValue>],
) -> Result<BytesStart<'static>, ConverterError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut dimension = BytesStart::new(name);
    for result in element.attributes() {
        let attribute = result?;
        if attribute.key.as_ref() != b"ref" {
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.get_value()?.into_owned();
            dimension.push_attribute((key.as_str(), value.as_str()));
            continue;
        }
        let value = attribute.get_value()?;
        let value = value.as_ref();
        let (start, end) = value.split_once(':').unwrap_or((value, value));
        let (end_row, end_col) = reference_to_index(end).unwrap_or((0, 0));
        let width = rows.iter().map(|values| written_width(values)).max().unwrap_or(0);
        let last_col = if width > 0 { end_col.max(width - 1) } else { end_col };
        let mut last_row = (end_row + 1).min(kept_rows);
        if !rows.is_empty() {
            last_row = last_row.max(kept_rows + rows.len());
        }
        let reference = format!("{}:{}{}", start, index_to_col(last_col), last_row.max(1));
        dimension.push_attribute(("ref", reference.as_str()));
    }
    Ok(dimension)
}

/// Whether the `ref` range of a `<mergeCell>` starts on a kept row.
/// Ranges that cannot be read are kept.
fn starts_within(element: &BytesStart, kept_rows: usize) -> Result<bool, ConverterError> {
    for result in element.attributes() {
        let attribute = result?;
        if attribute.key.as_ref() == b"ref" {
            let value = attribute.get_value()?;
            let start = value.split(':').next().unwrap_or_default();
            return Ok(reference_to_index(start).map_or(true, |(row, _)| row < kept_rows));
        }
    }
    Ok(true)
}

/// Copies an element, replacing the value of the attribute `key` when present.
fn replace_attribute(element: &BytesStart, key: &[u8], value: &str) -> Result<BytesStart<'static>, ConverterError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut copy = BytesStart::new(name);
    for result in element.attributes() {
        let attribute = result?;
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        if attribute.key.as_ref() == key {
            copy.push_attribute((name.as_str(), value));
        } else {
            copy.push_attribute((name.as_str(), attribute.get_value()?.as_ref()));
        }
    }
    Ok(copy)
}

/// Number of leading columns up to and including the last cell that is written.
fn written_width(values: &[OutputValue]) -> usize {
    values
        .iter()
        .rposition(|value| !matches!(value, OutputValue::Text(text) if text.is_empty()))
        .map_or(0, |last| last + 1)
}

/// Writes rows starting at the 0-based sheet row `first_row`. Empty text writes no cell.
fn write_rows<W: Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    first_row: usize,
    rows: &[Vec<OutputValue>],
) -> Result<(), ConverterError> {
    let row_tag = format!("{prefix}row");
    let cell_tag = format!("{prefix}c");
    let value_tag = format!("{prefix}v");
    let inline_tag = format!("{prefix}is");
    let text_tag = format!("{prefix}t");
    for (offset, values) in rows.iter().enumerate() {
        let row = first_row + offset;
        let number = (row + 1).to_string();
        let mut element = BytesStart::new(row_tag.as_str());
        element.push_attribute(("r", number.as_str()));
        writer.write_event(Event::Start(element))?;
        for (col, value) in values.iter().enumerate() {
            if matches!(value, OutputValue::Text(text) if text.is_empty()) {
                continue;
            }
            let reference = index_to_reference(row, col);
            let mut cell = BytesStart::new(cell_tag.as_str());
            cell.push_attribute(("r", reference.as_str()));
            match value {
                OutputValue::Number(number) => {
                    let number = if number.is_finite() { format_number(*number) } else { "0".to_owned() };
                    writer.write_event(Event::Start(cell))?;
                    writer.write_event(Event::Start(BytesStart::new(value_tag.as_str())))?;
                    writer.write_event(Event::Text(BytesText::new(&number)))?;
                    writer.write_event(Event::End(BytesEnd::new(value_tag.as_str())))?;
                }
                OutputValue::Text(text) => {
                    cell.push_attribute(("t", "inlineStr"));
                    writer.write_event(Event::Start(cell))?;
                    writer.write_event(Event::Start(BytesStart::new(inline_tag.as_str())))?;
                    let mut text_element = BytesStart::new(text_tag.as_str());
                    if text.trim() != text {
                        text_element.push_attribute(("xml:space", "preserve"));
                    }
                    writer.write_event(Event::Start(text_element))?;
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                    writer.write_event(Event::End(BytesEnd::new(text_tag.as_str())))?;
                    writer.write_event(Event::End(BytesEnd::new(inline_tag.as_str())))?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new(cell_tag.as_str())))?;
        }
        writer.write_event(Event::End(BytesEnd::new(row_tag.as_str())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C4"/><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Order ID</t></is></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>Media Plan Name</t></is></c><c r="B2" t="inlineStr"><is><t>Start Date</t></is></c></row><row r="3"><c r="A3"><v>1</v></c></row><row r="4"><c r="C4"/></row></sheetData><pageMargins left="0.7"/></worksheet>"#;

    fn rewrite(rows: &[Vec<OutputValue>]) -> String {
        let xml = rewrite_sheet_xml(SHEET.as_bytes(), 1, rows).unwrap();
        String::from_utf8(xml).unwrap()
    }

    #[test]
    fn keeps_rows_up_to_header_and_replaces_the_rest() {
        let output = rewrite(&[vec![OutputValue::text("Plan & Co"), OutputValue::Number(5.0)]]);
        assert!(output.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(output.contains(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Order ID</t></is></c></row>"#));
        assert!(output.contains("Media Plan Name"));
        assert!(!output.contains(r#"<c r="A3"><v>1</v></c>"#));
        assert!(!output.contains(r#"r="C4""#));
        assert!(output.contains(r#"<row r="3"><c r="A3" t="inlineStr"><is><t>Plan &amp; Co</t></is></c><c r="B3"><v>5</v></c></row></sheetData>"#));
        assert!(output.contains(r#"<dimension ref="A1:C3"/>"#));
        assert!(output.ends_with(r#"<pageMargins left="0.7"/></worksheet>"#));
    }

    #[test]
    fn empty_projection_clears_data_rows() {
        let output = rewrite(&[]);
        assert!(output.contains(r#"<row r="2">"#));
        assert!(!output.contains(r#"<row r="3">"#));
        assert!(output.contains(r#"<dimension ref="A1:C2"/>"#));
    }

    #[test]
    fn empty_sheet_data_receives_rows() {
        let xml = br#"<worksheet><sheetData/></worksheet>"#;
        let output = rewrite_sheet_xml(xml, 8, &[vec![OutputValue::text(" padded ")]]).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            r#"<worksheet><sheetData><row r="10"><c r="A10" t="inlineStr"><is><t xml:space="preserve"> padded </t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn empty_text_writes_no_cell() {
        let xml = br#"<worksheet><sheetData/></worksheet>"#;
        let row = vec![OutputValue::text(""), OutputValue::Number(0.0)];
        let output = String::from_utf8(rewrite_sheet_xml(xml, 0, &[row]).unwrap()).unwrap();
        assert_eq!(output, r#"<worksheet><sheetData><row r="2"><c r="B2"><v>0</v></c></row></sheetData></worksheet>"#);
    }

    #[test]
    fn dimension_ignores_trailing_blank_cells() {
        let row: Vec<OutputValue> = ["a", "b", "c", "d", ""].into_iter().map(OutputValue::text).collect();
        let output = rewrite(&[row]);
        assert!(output.contains(r#"<dimension ref="A1:D3"/>"#));
    }

    #[test]
    fn merges_below_the_header_are_dropped() {
        let xml = br#"<worksheet><sheetData><row r="1"/></sheetData><mergeCells count="3"><mergeCell ref="A1:C1"/><mergeCell ref="A2:B2"/><mergeCell ref="D5:E9"/></mergeCells><pageMargins/></worksheet>"#;
        let output = String::from_utf8(rewrite_sheet_xml(xml, 0, &[]).unwrap()).unwrap();
        assert_eq!(
            output,
            r#"<worksheet><sheetData><row r="1"/></sheetData><mergeCells count="1"><mergeCell ref="A1:C1"/></mergeCells><pageMargins/></worksheet>"#
        );
    }

    #[test]
    fn merge_container_goes_when_every_merge_is_dropped() {
        let xml = br#"<x:worksheet xmlns:x="urn:x"><x:sheetData/><x:mergeCells count="1"><x:mergeCell ref="$A$10:$B$10"></x:mergeCell></x:mergeCells></x:worksheet>"#;
        let output = String::from_utf8(rewrite_sheet_xml(xml, 8, &[]).unwrap()).unwrap();
        assert_eq!(output, r#"<x:worksheet xmlns:x="urn:x"><x:sheetData></x:sheetData></x:worksheet>"#);
    }

    #[test]
    fn rows_without_reference_are_counted() {
        let xml = br#"<worksheet><sheetData><row><c><v>1</v></c></row><row><c><v>2</v></c></row></sheetData></worksheet>"#;
        let output = String::from_utf8(rewrite_sheet_xml(xml, 0, &[]).unwrap()).unwrap();
        assert_eq!(output, r#"<worksheet><sheetData><row><c><v>1</v></c></row></sheetData></worksheet>"#);
    }
}
