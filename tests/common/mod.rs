//! Builds small Office Open XML and legacy Excel 97-2003 workbooks in memory.
#![allow(dead_code)]

use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipArchive;
use zip::ZipWriter;

/// A cell written into a test worksheet.
#[derive(Clone, Debug)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    /// Date-serial formatted with the built-in date format
    Date(f64),
}

pub fn t(text: &str) -> Cell {
    if text.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(text.to_owned())
    }
}

pub fn n(number: f64) -> Cell {
    Cell::Number(number)
}

pub fn d(serial: f64) -> Cell {
    Cell::Date(serial)
}

/// Row of text cells.
pub fn texts(cells: &[&str]) -> Vec<Cell> {
    cells.iter().map(|cell| t(cell)).collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn column(mut index: usize) -> String {
    let mut name = String::new();
    loop {
        name.insert(0, (b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name
}

/// Worksheet XML for the given rows; row `i` is written as sheet row `i + 1`.
pub fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str("\n");
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str(&format!(r#"<dimension ref="A1:{}{}"/>"#, column(width - 1), rows.len().max(1)));
    xml.push_str("<sheetData>");
    for (index, row) in rows.iter().enumerate() {
        if row.iter().all(|cell| matches!(cell, Cell::Empty)) {
            continue;
        }
        let number = index + 1;
        xml.push_str(&format!(r#"<row r="{number}">"#));
        for (col, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column(col), number);
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(text)
                )),
                Cell::Number(value) => xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#)),
                Cell::Date(value) => xml.push_str(&format!(r#"<c r="{reference}" s="1"><v>{value}</v></c>"#)),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str(r#"</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#);
    xml
}

/// A workbook package with the given sheets, in order.
pub fn workbook(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (index, (name, _)) in sheets.iter().enumerate() {
        let number = index + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    relationships.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheets.len() + 1
    ));

    let styles = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;
    let root_relationships = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut add = |name: &str, content: &str| {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    };
    add("[Content_Types].xml", &content_types);
    add("_rels/.rels", root_relationships);
    add("xl/workbook.xml", &workbook);
    add("xl/_rels/workbook.xml.rels", &relationships);
    add("xl/styles.xml", styles);
    for (index, (_, rows)) in sheets.iter().enumerate() {
        add(&format!("xl/worksheets/sheet{}.xml", index + 1), &sheet_xml(rows));
    }
    zip.finish().unwrap().into_inner()
}

/// The standard order template: an order id row, blank rows, the header at
/// row index 8 and one stale data row below it.
pub fn order_template(sheet_name: &str) -> Vec<u8> {
    let mut rows = vec![texts(&["Order ID", "117224"])];
    rows.extend((0..7).map(|_| Vec::new()));
    rows.push(texts(&[
        "Media Plan Name",
        "Section Name",
        "Start Date",
        "End Date",
        "Line Item Name",
        "Group Name",
        "Product Name",
        "Agency Discount",
        "Net Unit Cost",
        "Cost Method",
        "Unit Type",
        "Quantity",
        "Can Output",
        "Can Invoice",
        "Billable Third Party Server",
        "DMA",
        "State",
        "Congressional District",
    ]));
    rows.push(texts(&["Stale Plan", "Stale Section"]));
    workbook(&[("Instructions", vec![texts(&["Fill in the SO Template sheet"])]), (sheet_name, rows)])
}

fn biff_record(kind: u16, body: &[u8]) -> Vec<u8> {
    let mut bytes = kind.to_le_bytes().to_vec();
    bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// UTF-16 character data behind an option flag
fn biff_chars(text: &str) -> Vec<u8> {
    let mut bytes = vec![0x01];
    bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
    bytes
}

fn biff_cell(row: usize, col: usize, xf: u16) -> Vec<u8> {
    [(row as u16).to_le_bytes(), (col as u16).to_le_bytes(), xf.to_le_bytes()].concat()
}

/// The BIFF8 workbook stream: text cells go through the shared string table,
/// dates use the built-in date format.
fn biff_stream(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    const BOF: u16 = 2057;
    const EOF: u16 = 10;
    const CODE_PAGE: u16 = 66;
    const XF: u16 = 224;
    const SST: u16 = 252;
    const BOUND_SHEET8: u16 = 133;
    const LABEL_SST: u16 = 253;
    const NUMBER: u16 = 515;

    let mut strings: Vec<String> = Vec::new();
    let mut substreams: Vec<Vec<u8>> = Vec::new();
    for (_, rows) in sheets {
        let mut substream = biff_record(BOF, &[0x00, 0x06, 0x10, 0x00]);
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                match cell {
                    Cell::Empty => {}
                    Cell::Text(text) => {
                        let index = strings.iter().position(|it| it == text).unwrap_or_else(|| {
                            strings.push(text.to_owned());
                            strings.len() - 1
                        });
                        let body = [biff_cell(row, col, 0), (index as u32).to_le_bytes().to_vec()].concat();
                        substream.extend(biff_record(LABEL_SST, &body));
                    }
                    Cell::Number(value) => {
                        let body = [biff_cell(row, col, 0), value.to_le_bytes().to_vec()].concat();
                        substream.extend(biff_record(NUMBER, &body));
                    }
                    Cell::Date(value) => {
                        let body = [biff_cell(row, col, 1), value.to_le_bytes().to_vec()].concat();
                        substream.extend(biff_record(NUMBER, &body));
                    }
                }
            }
        }
        substream.extend(biff_record(EOF, &[]));
        substreams.push(substream);
    }

    let mut globals = biff_record(BOF, &[0x00, 0x06, 0x05, 0x00]);
    globals.extend(biff_record(CODE_PAGE, &1252u16.to_le_bytes()));
    for format in [0u16, 14] {
        let mut body = vec![0, 0];
        body.extend_from_slice(&format.to_le_bytes());
        body.resize(20, 0);
        globals.extend(biff_record(XF, &body));
    }
    let mut sst = (strings.len() as u32).to_le_bytes().to_vec();
    sst.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for string in &strings {
        sst.extend_from_slice(&(string.encode_utf16().count() as u16).to_le_bytes());
        sst.extend(biff_chars(string));
    }
    globals.extend(biff_record(SST, &sst));
    let mut pointers = Vec::new();
    for (name, _) in sheets {
        pointers.push(globals.len() + 4);
        let mut body = vec![0u8; 4];
        body.extend_from_slice(&[0, 0, name.encode_utf16().count() as u8]);
        body.extend(biff_chars(name));
        globals.extend(biff_record(BOUND_SHEET8, &body));
    }
    globals.extend(biff_record(EOF, &[]));

    let mut position = globals.len();
    for (at, substream) in pointers.into_iter().zip(&substreams) {
        globals[at..at + 4].copy_from_slice(&(position as u32).to_le_bytes());
        position += substream.len();
    }
    substreams.into_iter().fold(globals, |mut stream, substream| {
        stream.extend(substream);
        stream
    })
}

/// A legacy `.xls` workbook: a version 3 compound file whose "Workbook"
/// stream lives in regular 512-byte sectors.
pub fn legacy_workbook(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    const SECTOR: usize = 512;
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;
    fn put(data: &mut [u8], at: usize, value: u32) {
        data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    fn entry(name: &str, kind: u8, start: u32, size: usize) -> Vec<u8> {
        let mut entry = vec![0u8; 128];
        let units: Vec<u8> = name.encode_utf16().chain([0]).flat_map(u16::to_le_bytes).collect();
        entry[..units.len()].copy_from_slice(&units);
        entry[64..66].copy_from_slice(&(units.len() as u16).to_le_bytes());
        entry[66] = kind;
        put(&mut entry, 68, FREE);
        put(&mut entry, 72, FREE);
        put(&mut entry, 76, FREE);
        put(&mut entry, 116, start);
        entry[120..128].copy_from_slice(&(size as u64).to_le_bytes());
        entry
    }

    // Streams under 4096 bytes would live in the mini stream
    let mut stream = biff_stream(sheets);
    stream.resize(stream.len().max(4096).div_ceil(SECTOR) * SECTOR, 0);
    let stream_sectors = stream.len() / SECTOR;
    assert!(stream_sectors + 2 <= SECTOR / 4, "workbook stream too large for one allocation sector");

    let mut data = vec![0u8; SECTOR * 3];
    data[..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    data[24..26].copy_from_slice(&0x3Eu16.to_le_bytes());
    data[26..28].copy_from_slice(&3u16.to_le_bytes());
    data[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    data[30..32].copy_from_slice(&9u16.to_le_bytes());
    data[32..34].copy_from_slice(&6u16.to_le_bytes());
    put(&mut data, 44, 1);
    put(&mut data, 48, 1);
    put(&mut data, 56, 4096);
    put(&mut data, 60, END_OF_CHAIN);
    put(&mut data, 64, 0);
    put(&mut data, 68, END_OF_CHAIN);
    put(&mut data, 72, 0);
    put(&mut data, 76, 0);
    for at in (80..SECTOR).step_by(4) {
        put(&mut data, at, FREE);
    }

    let table = SECTOR;
    for index in 0..SECTOR / 4 {
        let value = match index {
            0 => 0xFFFF_FFFD,
            1 => END_OF_CHAIN,
            _ if index < stream_sectors + 1 => index as u32 + 1,
            _ if index == stream_sectors + 1 => END_OF_CHAIN,
            _ => FREE,
        };
        put(&mut data, table + index * 4, value);
    }

    let directory = SECTOR * 2;
    data[directory..directory + 128].copy_from_slice(&entry("Root Entry", 5, END_OF_CHAIN, 0));
    data[directory + 128..directory + 256].copy_from_slice(&entry("Workbook", 2, 2, stream.len()));

    data.extend(stream);
    data
}

/// A package holding exactly the given parts.
pub fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Reads one entry of a package as text.
pub fn entry_text(package: &[u8], name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = zip.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

/// Entry names of a package, in archive order.
pub fn entry_names(package: &[u8]) -> Vec<String> {
    let zip = ZipArchive::new(Cursor::new(package)).unwrap();
    zip.file_names().map(str::to_owned).collect()
}
