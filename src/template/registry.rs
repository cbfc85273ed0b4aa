//! Static per-category table of output templates.
use crate::error::ConverterError;
use crate::schedule::DestinationCategory;
use crate::schedule::DEFAULT_CATEGORY;
use crate::template::ColumnLayout;
use crate::template::OrderHeader;
use crate::template::TemplateError;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Sheet holding the data region of the standard order template.
pub const DEFAULT_SHEET_NAME: &str = "SO Template";

/// Header row of the standard order template (display row 9).
pub const DEFAULT_HEADER_ROW_INDEX: usize = 8;

/// Output naming pattern; `{base}` is the input name without its extension.
pub const DEFAULT_OUTPUT_NAME: &str = "{base}_{category}.xlsx";

const CONTENT_TYPE_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const CONTENT_TYPE_XLSM: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";

static SPREADSHEET_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(xlsx|xlsm|xls)$").expect("Hardcode regex pattern"));

/// Everything needed to produce one category's output document.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputTemplate {
    pub category: DestinationCategory,
    /// Path or `file://` URL handed to the template source
    pub location: String,
    /// Sheet holding the data region
    pub sheet_name: String,
    /// 0-based header row of the data region
    pub header_row_index: usize,
    /// Naming pattern with `{base}` and `{category}` placeholders
    pub output_name: String,
    pub layout: ColumnLayout,
    pub order: OrderHeader,
}

impl OutputTemplate {
    /// The standard order template of a category.
    pub fn standard(category: DestinationCategory) -> Self {
        Self {
            category,
            location: format!("operative-{}-template.xlsx", category.name().to_lowercase()),
            sheet_name: DEFAULT_SHEET_NAME.to_owned(),
            header_row_index: DEFAULT_HEADER_ROW_INDEX,
            output_name: DEFAULT_OUTPUT_NAME.to_owned(),
            layout: ColumnLayout::default(),
            order: OrderHeader::for_category(category),
        }
    }

    /// Output file name for an input whose base name is `base`.
    pub fn output_file_name(&self, base: &str) -> String {
        self.output_name
            .replace("{base}", base)
            .replace("{category}", self.category.name())
    }
}

/// The category registry consumed by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Registry {
    templates: BTreeMap<DestinationCategory, OutputTemplate>,
    default_category: DestinationCategory,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            templates: DestinationCategory::ALL
                .into_iter()
                .map(|category| (category, OutputTemplate::standard(category)))
                .collect(),
            default_category: DEFAULT_CATEGORY,
        }
    }
}

impl Registry {
    /// Template of a category
    pub fn get(&self, category: DestinationCategory) -> Option<&OutputTemplate> {
        self.templates.get(&category)
    }

    pub fn get_mut(&mut self, category: DestinationCategory) -> &mut OutputTemplate {
        self.templates
            .entry(category)
            .or_insert_with(|| OutputTemplate::standard(category))
    }

    /// Category that ambiguous rows fall back to.
    pub fn default_category(&self) -> DestinationCategory {
        self.default_category
    }

    pub fn with_default_category(mut self, category: DestinationCategory) -> Self {
        self.default_category = category;
        self
    }

    /// Templates in category declaration order.
    pub fn templates(&self) -> impl Iterator<Item = &OutputTemplate> {
        self.templates.values()
    }

    /// Sets the header row index of every template.
    pub fn with_header_row_index(mut self, header_row_index: usize) -> Self {
        for template in self.templates.values_mut() {
            template.header_row_index = header_row_index;
        }
        self
    }
}

/// Content type of an Office Open XML document, by file extension.
pub fn content_type(file_name: &str) -> Result<&'static str, ConverterError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" => Ok(CONTENT_TYPE_XLSX),
        "xlsm" => Ok(CONTENT_TYPE_XLSM),
        _ => Err(TemplateError::UnsupportedOutputFormat(file_name.to_owned()))?,
    }
}

/// Removes a trailing spreadsheet extension from an input file name.
pub fn base_name(file_name: &str) -> String {
    let file_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    SPREADSHEET_EXTENSION.replace(file_name, "").into_owned()
}
