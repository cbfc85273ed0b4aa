mod common;

use common::d;
use common::entry_names;
use common::entry_text;
use common::legacy_workbook;
use common::n;
use common::order_template;
use common::t;
use common::texts;
use common::workbook;
use common::Cell;
use rusty_schedule::schedule::ExtractionIssue;
use rusty_schedule::spreadsheet::CellValue;
use rusty_schedule::spreadsheet::SpreadsheetError;
use rusty_schedule::spreadsheet::XlsxWorkbook;
use rusty_schedule::template::ColumnLayout;
use rusty_schedule::ConverterError;
use rusty_schedule::DestinationCategory;
use rusty_schedule::DirectorySink;
use rusty_schedule::FileTemplateSource;
use rusty_schedule::MemoryTemplateSource;
use rusty_schedule::OutputDocument;
use rusty_schedule::Pipeline;
use rusty_schedule::Registry;
use rusty_schedule::TemplateError;

const INPUT_NAME: &str = "Q3 Effectv IO.xlsx";
const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn schedule_rows() -> Vec<Vec<Cell>> {
    vec![
        texts(&["Insertion Order"]),
        texts(&["Advertiser", "Acme Outdoor"]),
        vec![],
        texts(&["Markets", "Property", "Placement", "Target", "Start Date", "End Date", "Impressions", "Net Investment"]),
        vec![t("Denver"), t("Spectrum Reach"), t("Sports"), t("A25-54"), d(45_292.0), d(45_322.0), t("1,000,000"), t("$5,000")],
        vec![t("Boston"), t("Comcast"), t(""), t(""), t("2024-02-01"), t(""), n(2000.0), n(100.0)],
        vec![t("Hartford"), t("Ampersand"), t("Promo"), t(""), t("2024-02-01"), t("2024-02-10"), n(1.0), n(1.0)],
        vec![t("Tampa"), t("Local"), t("Promo"), t(""), t("TBD"), t(""), n(1.0), n(1.0)],
        vec![t("Austin"), t("Local TV"), t("News"), t(""), t(""), t("3/15/2024"), n(0.0), n(250.0)],
    ]
}

fn schedule() -> Vec<u8> {
    workbook(&[("IO", schedule_rows())])
}

fn templates() -> MemoryTemplateSource {
    MemoryTemplateSource::new()
        .with(DestinationCategory::Spectrum, order_template("SO Template"))
        .with(DestinationCategory::Effectv, order_template("SO Template"))
}

fn output_grid(document: &OutputDocument) -> rusty_schedule::spreadsheet::RawGrid {
    let mut workbook = XlsxWorkbook::from_bytes(&document.file_name, document.bytes.clone()).unwrap();
    workbook.sheet("SO Template").unwrap()
}

fn text(value: &str) -> CellValue {
    CellValue::from(value)
}

#[test]
fn converts_schedule_into_one_document_per_category() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (documents, report) = pipeline.convert(INPUT_NAME, schedule()).unwrap();

    assert_eq!(report.sheet_name.as_deref(), Some("IO"));
    assert_eq!(report.header_row, Some(3));
    assert_eq!(report.lines_extracted, 3);
    assert_eq!(report.issue, None);
    assert_eq!(report.stats.skipped_excluded_property, 1);
    assert_eq!(report.stats.skipped_missing_dates, 1);
    assert_eq!(report.lines_per_category[&DestinationCategory::Spectrum], 1);
    assert_eq!(report.lines_per_category[&DestinationCategory::Effectv], 2);

    let names: Vec<_> = documents.iter().map(|document| document.file_name.as_str()).collect();
    assert_eq!(names, vec!["Q3 Effectv IO_Spectrum.xlsx", "Q3 Effectv IO_Effectv.xlsx"]);
    assert!(documents.iter().all(|document| document.content_type == XLSX));
    assert_eq!(report.outputs, names);
}

#[test]
fn projects_spectrum_rows() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (documents, _) = pipeline.convert(INPUT_NAME, schedule()).unwrap();
    let grid = output_grid(&documents[0]);

    assert_eq!(grid.len(), 10);
    assert_eq!(grid.cell(0, 0), &text("Order ID"));
    assert_eq!(grid.cell(0, 1), &text("117224"));
    assert_eq!(grid.cell(8, 0), &text("Media Plan Name"));

    assert_eq!(grid.cell(9, 0), &text("Default Media Plan"));
    assert_eq!(grid.cell(9, 1), &text("Default Section"));
    assert_eq!(grid.cell(9, 2), &text("01/01/2024"));
    assert_eq!(grid.cell(9, 3), &text("01/31/2024"));
    assert_eq!(grid.cell(9, 4), &text("Sports"));
    assert_eq!(grid.cell(9, 5), &CellValue::Empty);
    assert_eq!(grid.cell(9, 6), &text("Spectrum"));
    assert_eq!(grid.cell(9, 7), &CellValue::Number(0.0));
    assert_eq!(grid.cell(9, 8), &CellValue::Number(5.0));
    assert_eq!(grid.cell(9, 9), &text("CPM"));
    assert_eq!(grid.cell(9, 10), &text("Impressions"));
    assert_eq!(grid.cell(9, 11), &CellValue::Number(1_000_000.0));
    assert_eq!(grid.cell(9, 12), &text("TRUE"));
    assert_eq!(grid.cell(9, 13), &text("TRUE"));
    assert_eq!(grid.cell(9, 25), &text("A25-54"));
}

#[test]
fn projects_effectv_rows_with_fallbacks() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (documents, _) = pipeline.convert(INPUT_NAME, schedule()).unwrap();
    let grid = output_grid(&documents[1]);

    assert_eq!(grid.len(), 11);
    // Boston: end date falls back to the start date and the label is synthesized
    assert_eq!(grid.cell(9, 2), &text("02/01/2024"));
    assert_eq!(grid.cell(9, 3), &text("02/01/2024"));
    assert_eq!(grid.cell(9, 4), &text("Boston 2024-02-01\u{2013}2024-02-01"));
    assert_eq!(grid.cell(9, 6), &text("Effectv"));
    assert_eq!(grid.cell(9, 8), &CellValue::Number(50.0));
    // Austin has no signals of its own and follows the file name
    assert_eq!(grid.cell(10, 2), &text("03/15/2024"));
    assert_eq!(grid.cell(10, 4), &text("News"));
    assert_eq!(grid.cell(10, 8), &CellValue::Number(0.0));
    assert_eq!(grid.cell(10, 11), &CellValue::Number(0.0));
}

#[test]
fn rows_above_the_data_region_are_untouched() {
    let template = order_template("SO Template");
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (documents, _) = pipeline.convert(INPUT_NAME, schedule()).unwrap();
    let output = &documents[0].bytes;

    assert_eq!(entry_names(output), entry_names(&template));
    for name in entry_names(&template) {
        if name != "xl/worksheets/sheet2.xml" {
            assert_eq!(entry_text(output, &name), entry_text(&template, &name), "entry {name}");
        }
    }

    let before = entry_text(&template, "xl/worksheets/sheet2.xml");
    let after = entry_text(output, "xl/worksheets/sheet2.xml");
    let start = before.find("<sheetData>").unwrap();
    let end = before.find(r#"<row r="10">"#).unwrap();
    assert!(after.contains(&before[start..end]));
    assert!(!after.contains("Stale Plan"));
    assert!(after.contains(r#"<dimension ref="A1:Z10"/>"#));
}

#[test]
fn conversion_is_deterministic() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (first, _) = pipeline.convert(INPUT_NAME, schedule()).unwrap();
    let (second, _) = pipeline.convert(INPUT_NAME, schedule()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_template_keeps_earlier_documents() {
    let source = MemoryTemplateSource::new().with(DestinationCategory::Spectrum, order_template("SO Template"));
    let pipeline = Pipeline::new(Registry::default(), source);
    let mut delivered = Vec::new();
    let result = pipeline.run(INPUT_NAME, schedule(), &mut delivered);

    assert!(matches!(
        result,
        Err(ConverterError::TemplateError(TemplateError::MissingTemplate(DestinationCategory::Effectv, _)))
    ));
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].category, DestinationCategory::Spectrum);
}

#[test]
fn template_without_data_region_fails() {
    let source = MemoryTemplateSource::new()
        .with(DestinationCategory::Spectrum, order_template("Orders"))
        .with(DestinationCategory::Effectv, order_template("SO Template"));
    let pipeline = Pipeline::new(Registry::default(), source);
    let result = pipeline.convert(INPUT_NAME, schedule());
    match result {
        Err(ConverterError::TemplateError(TemplateError::MissingDataRegion(template, sheet))) => {
            assert_eq!(template, "operative-spectrum-template.xlsx");
            assert_eq!(sheet, "SO Template");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn schedule_without_header_produces_nothing() {
    let input = workbook(&[("IO", vec![texts(&["Market", "Start"]), texts(&["Denver", "2024-01-01"])])]);
    let pipeline = Pipeline::new(Registry::default(), MemoryTemplateSource::new());
    let (documents, report) = pipeline.convert("io.xlsx", input).unwrap();
    assert!(documents.is_empty());
    assert_eq!(report.issue, Some(ExtractionIssue::NoHeaderFound));
}

#[test]
fn configured_default_category_routes_unsignalled_rows() {
    let input = workbook(&[(
        "IO",
        vec![
            texts(&["Markets", "Property", "Start Date", "Net Investment"]),
            vec![t("Austin"), t("Local TV"), t("2024-04-01"), n(100.0)],
        ],
    )]);
    let registry = Registry::default().with_default_category(DestinationCategory::Effectv);
    let pipeline = Pipeline::new(registry, templates());
    let (documents, report) = pipeline.convert("io.xlsx", input).unwrap();

    assert_eq!(report.lines_per_category.get(&DestinationCategory::Spectrum), None);
    assert_eq!(report.lines_per_category[&DestinationCategory::Effectv], 1);
    let names: Vec<_> = documents.iter().map(|document| document.file_name.as_str()).collect();
    assert_eq!(names, vec!["io_Effectv.xlsx"]);
}

#[test]
fn only_the_first_sheet_is_read() {
    let input = workbook(&[("Cover", vec![texts(&["Nothing here"])]), ("IO", schedule_rows())]);
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (documents, report) = pipeline.convert("io.xlsx", input).unwrap();
    assert!(documents.is_empty());
    assert_eq!(report.sheet_name.as_deref(), Some("Cover"));
    assert_eq!(report.issue, Some(ExtractionIssue::NoHeaderFound));
}

#[test]
fn legacy_workbooks_convert_like_packages() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let (expected, expected_report) = pipeline.convert("Q3 Effectv IO.xlsx", schedule()).unwrap();
    let legacy = legacy_workbook(&[("IO", schedule_rows())]);
    let (documents, report) = pipeline.convert("Q3 Effectv IO.xls", legacy).unwrap();

    assert_eq!(report.sheet_name.as_deref(), Some("IO"));
    assert_eq!(report.header_row, expected_report.header_row);
    assert_eq!(report.lines_per_category, expected_report.lines_per_category);
    assert_eq!(report.stats, expected_report.stats);
    assert_eq!(documents, expected);
}

#[test]
fn corrupt_legacy_workbooks_are_errors() {
    let mut legacy = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    legacy.resize(1024, 0);
    let pipeline = Pipeline::new(Registry::default(), templates());
    let result = pipeline.convert("io.xls", legacy);
    assert!(matches!(result, Err(ConverterError::CfbHelperError(_))));
}

#[test]
fn non_workbooks_are_rejected() {
    let pipeline = Pipeline::new(Registry::default(), templates());
    let result = pipeline.convert("io.csv", b"Markets,Start Date\nDenver,2024-01-01\n".to_vec());
    assert!(matches!(
        result,
        Err(ConverterError::SpreadsheetError(SpreadsheetError::UnsupportedFormat(_)))
    ));
}

#[test]
fn header_layout_follows_the_template() {
    let mut template_rows: Vec<Vec<Cell>> = (0..8).map(|_| Vec::new()).collect();
    template_rows.push(texts(&["Line Item Name", "Notes", "net unit cost", "Targeting"]));
    let template = workbook(&[("SO Template", template_rows)]);

    let mut registry = Registry::default();
    registry.get_mut(DestinationCategory::Spectrum).layout = ColumnLayout::FromHeaderRow;
    let source = MemoryTemplateSource::new().with(DestinationCategory::Spectrum, template);
    let pipeline = Pipeline::new(registry, source);

    let input = workbook(&[(
        "IO",
        vec![
            texts(&["Markets", "Property", "Start Date", "Net Investment", "Imps"]),
            vec![t("Denver"), t("Charter"), t("2024-05-01"), n(300.0), n(600_000.0)],
        ],
    )]);
    let (documents, _) = pipeline.convert("io.xlsx", input).unwrap();
    let grid = output_grid(&documents[0]);
    assert_eq!(grid.row(9).len(), 3);
    assert_eq!(grid.cell(9, 0), &text("Denver 2024-05-01\u{2013}2024-05-01"));
    assert_eq!(grid.cell(9, 1), &CellValue::Empty);
    assert_eq!(grid.cell(9, 2), &CellValue::Number(0.5));
}

#[test]
fn converts_files_on_disk() {
    let templates_dir = tempfile::tempdir().unwrap();
    std::fs::write(templates_dir.path().join("operative-spectrum-template.xlsx"), order_template("SO Template")).unwrap();
    std::fs::write(templates_dir.path().join("operative-effectv-template.xlsx"), order_template("SO Template")).unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let input = work_dir.path().join(INPUT_NAME);
    std::fs::write(&input, schedule()).unwrap();
    let out_dir = work_dir.path().join("out");

    let pipeline = Pipeline::new(Registry::default(), FileTemplateSource::new(templates_dir.path()));
    let mut sink = DirectorySink::new(&out_dir);
    let report = pipeline.run_path(&input, &mut sink).unwrap();

    assert_eq!(report.lines_extracted, 3);
    assert_eq!(
        sink.written(),
        &[out_dir.join("Q3 Effectv IO_Spectrum.xlsx"), out_dir.join("Q3 Effectv IO_Effectv.xlsx")]
    );
    let written = std::fs::read(out_dir.join("Q3 Effectv IO_Effectv.xlsx")).unwrap();
    let mut workbook = XlsxWorkbook::from_bytes("written", written).unwrap();
    assert_eq!(workbook.sheet("SO Template").unwrap().len(), 11);
}
