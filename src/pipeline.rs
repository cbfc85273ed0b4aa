//! One conversion run: schedule in, one output document per category out.
//!
//! Categories are projected in declaration order and each document goes to the
//! [`OutputSink`] as soon as it is complete. A failure in a later category does
//! not take back documents already delivered for earlier ones.
use crate::error::ConverterError;
use crate::error::ResultMessage;
use crate::schedule::read_schedule;
use crate::schedule::DestinationCategory;
use crate::schedule::ExtractionIssue;
use crate::schedule::ExtractionStats;
use crate::schedule::NormalizedLine;
use crate::schedule::Schedule;
use crate::spreadsheet::Workbook;
use crate::template::project_lines;
use crate::template::registry::base_name;
use crate::template::registry::content_type;
use crate::template::OutputTemplate;
use crate::template::Registry;
use crate::template::TemplateDocument;
use crate::template::TemplateError;
use crate::template::TemplateSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// A generated document for one category.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDocument {
    pub category: DestinationCategory,
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Number of projected lines
    pub lines: usize,
}

/// Receives output documents as they are produced.
pub trait OutputSink {
    fn accept(&mut self, document: OutputDocument) -> Result<(), ConverterError>;
}

impl OutputSink for Vec<OutputDocument> {
    fn accept(&mut self, document: OutputDocument) -> Result<(), ConverterError> {
        self.push(document);
        Ok(())
    }
}

/// Writes each document into a directory under its output file name.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            written: Vec::new(),
        }
    }

    /// Paths written so far, in delivery order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for DirectorySink {
    fn accept(&mut self, document: OutputDocument) -> Result<(), ConverterError> {
        let path = self.dir.join(&document.file_name);
        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, &document.bytes))
            .map_err(ConverterError::from)
            .with_prefix(&format!("Failed to write '{}'", path.display()))?;
        info!(path = %path.display(), lines = document.lines, "wrote output document");
        self.written.push(path);
        Ok(())
    }
}

/// Summary of one conversion run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub input_name: String,
    /// Sheet the schedule was read from
    pub sheet_name: Option<String>,
    pub header_row: Option<usize>,
    pub lines_extracted: usize,
    pub lines_per_category: BTreeMap<DestinationCategory, usize>,
    /// Why no lines were produced, when none were
    pub issue: Option<ExtractionIssue>,
    pub stats: ExtractionStats,
    /// Output file names, in delivery order
    pub outputs: Vec<String>,
}

/// Orchestrates reading, classification and projection against a category registry.
#[derive(Debug)]
pub struct Pipeline<S> {
    registry: Registry,
    source: S,
}

impl<S: TemplateSource> Pipeline<S> {
    pub fn new(registry: Registry, source: S) -> Self {
        Self { registry, source }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Reads and classifies the first sheet of a schedule document.
    ///
    /// A document without a worksheet, header or market column yields an empty
    /// schedule carrying the reason; only unreadable documents are errors.
    pub fn read(&self, input_name: &str, bytes: Vec<u8>) -> Result<(Option<String>, Schedule), ConverterError> {
        let file_name = file_name_of(input_name);
        let mut workbook = Workbook::from_bytes(input_name, bytes)?;
        match workbook.first_sheet()? {
            Some(grid) => {
                let schedule = read_schedule(&grid, &file_name, self.registry.default_category());
                Ok((Some(grid.name().to_owned()), schedule))
            }
            None => Ok((None, Schedule::empty(ExtractionIssue::NoSheet))),
        }
    }

    /// Converts one schedule document, delivering each category's document to `sink`.
    pub fn run<K: OutputSink + ?Sized>(
        &self,
        input_name: &str,
        bytes: Vec<u8>,
        sink: &mut K,
    ) -> Result<ConversionReport, ConverterError> {
        let (sheet_name, schedule) = self.read(input_name, bytes)?;
        let mut report = ConversionReport {
            input_name: input_name.to_owned(),
            sheet_name,
            header_row: schedule.header_row,
            lines_extracted: schedule.lines.len(),
            issue: schedule.issue,
            stats: schedule.stats,
            ..ConversionReport::default()
        };
        info!(
            input = input_name,
            lines = report.lines_extracted,
            header_row = ?report.header_row,
            "read schedule"
        );

        let base = base_name(&file_name_of(input_name));
        for (category, lines) in group_by_category(schedule.lines) {
            let template = self
                .registry
                .get(category)
                .ok_or_else(|| TemplateError::MissingTemplate(category, String::new()))?;
            let document = self.project(template, &base, &lines)?;
            info!(
                input = input_name,
                category = %category,
                output = %document.file_name,
                lines = document.lines,
                "projected category"
            );
            report.lines_per_category.insert(category, document.lines);
            report.outputs.push(document.file_name.to_owned());
            sink.accept(document)?;
        }
        Ok(report)
    }

    /// Converts a schedule document stored on disk.
    pub fn run_path<P: AsRef<Path>, K: OutputSink + ?Sized>(
        &self,
        path: P,
        sink: &mut K,
    ) -> Result<ConversionReport, ConverterError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(ConverterError::from)
            .with_prefix(&format!("Failed to read '{}'", path.display()))?;
        self.run(&path.to_string_lossy(), bytes, sink)
    }

    /// Converts one schedule document, collecting the output documents.
    pub fn convert(&self, input_name: &str, bytes: Vec<u8>) -> Result<(Vec<OutputDocument>, ConversionReport), ConverterError> {
        let mut documents = Vec::new();
        let report = self.run(input_name, bytes, &mut documents)?;
        Ok((documents, report))
    }

    /// Fills one category's template with its lines.
    fn project(&self, template: &OutputTemplate, base: &str, lines: &[NormalizedLine]) -> Result<OutputDocument, ConverterError> {
        let file_name = template.output_file_name(base);
        let content_type = content_type(&file_name)?;
        let bytes = self
            .source
            .fetch(template.category, &template.location)?
            .ok_or_else(|| TemplateError::MissingTemplate(template.category, template.location.to_owned()))?;
        let document = TemplateDocument::open(&template.location, bytes, &template.sheet_name, template.header_row_index)?;
        let columns = template
            .layout
            .resolve(document.name(), template.header_row_index, document.header_row())?;
        let rows = project_lines(lines, &template.order, &columns);
        Ok(OutputDocument {
            category: template.category,
            file_name,
            content_type,
            bytes: document.replace_data_rows(&rows)?,
            lines: lines.len(),
        })
    }
}

/// Lines grouped by category in declaration order, keeping input order within a group.
pub fn group_by_category(lines: Vec<NormalizedLine>) -> BTreeMap<DestinationCategory, Vec<NormalizedLine>> {
    let mut groups = BTreeMap::<DestinationCategory, Vec<NormalizedLine>>::new();
    for line in lines {
        groups.entry(line.category).or_default().push(line);
    }
    groups
}

/// Last path component of an input name.
fn file_name_of(input_name: &str) -> String {
    Path::new(input_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn line(category: DestinationCategory, market: &str) -> NormalizedLine {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        NormalizedLine {
            category,
            market: market.to_owned(),
            start_date: date,
            end_date: date,
            line_item_name: market.to_owned(),
            net_investment: 0.0,
            quantity: 0.0,
            targeting: String::new(),
            source_row_index: 0,
        }
    }

    #[test]
    fn groups_in_declaration_order() {
        let groups = group_by_category(vec![
            line(DestinationCategory::Effectv, "Boston"),
            line(DestinationCategory::Spectrum, "Denver"),
            line(DestinationCategory::Effectv, "Hartford"),
        ]);
        let categories: Vec<_> = groups.keys().copied().collect();
        assert_eq!(categories, vec![DestinationCategory::Spectrum, DestinationCategory::Effectv]);
        let markets: Vec<_> = groups[&DestinationCategory::Effectv].iter().map(|line| line.market.as_str()).collect();
        assert_eq!(markets, vec!["Boston", "Hartford"]);
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name_of("/data/in/Spectrum IO.xlsx"), "Spectrum IO.xlsx");
        assert_eq!(file_name_of("io.xlsx"), "io.xlsx");
    }

    #[test]
    fn directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sink = DirectorySink::new(&out);
        sink.accept(OutputDocument {
            category: DestinationCategory::Spectrum,
            file_name: "io_Spectrum.xlsx".to_owned(),
            content_type: "application/octet-stream",
            bytes: vec![1, 2, 3],
            lines: 1,
        })
        .unwrap();
        assert_eq!(sink.written(), &[out.join("io_Spectrum.xlsx")]);
        assert_eq!(std::fs::read(out.join("io_Spectrum.xlsx")).unwrap(), vec![1, 2, 3]);
    }
}
