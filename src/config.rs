//! TOML configuration of templates and order defaults.
//!
//! Example:
//!
//! ```toml
//! templates_dir = "templates"
//! output_format = "xlsx"
//! default_category = "Effectv"
//!
//! [categories.Effectv]
//! template = "file:///srv/templates/effectv.xlsx"
//! header_row_index = 9
//! output_name = "{base}-effectv.xlsx"
//! layout = "header"
//!
//! [categories.Effectv.order]
//! order_id = "117224"
//! cost_method = "Flat"
//! can_invoice = false
//! ```
use crate::error::ConverterError;
use crate::error::ResultMessage;
use crate::schedule::DestinationCategory;
use crate::template::ColumnLayout;
use crate::template::OrderHeader;
use crate::template::OutputField;
use crate::template::Registry;
use crate::template::TemplateError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the configuration file's contents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Unknown output column '{1}' for {0}")]
    UnknownColumn(DestinationCategory, String),

    /// `columns` given together with `layout = "header"`
    #[error("Columns are read from the template header for {0}; remove 'columns'")]
    ConflictingLayout(DestinationCategory),
}

/// How a category's output columns are laid out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Fixed,
    Header,
}

/// Overrides of a category's order-level values.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderConfig {
    pub order_id: Option<String>,
    pub media_plan_name: Option<String>,
    pub section_name: Option<String>,
    pub product_name: Option<String>,
    pub group_name: Option<String>,
    pub cost_method: Option<String>,
    pub unit_type: Option<String>,
    pub can_output: Option<bool>,
    pub can_invoice: Option<bool>,
    pub billable_third_party_server: Option<String>,
    pub dma: Option<String>,
    pub state: Option<String>,
    pub congressional_district: Option<String>,
}

impl OrderConfig {
    fn apply(&self, order: &mut OrderHeader) {
        let texts = [
            (&self.order_id, &mut order.order_id),
            (&self.media_plan_name, &mut order.media_plan_name),
            (&self.section_name, &mut order.section_name),
            (&self.product_name, &mut order.product_name),
            (&self.group_name, &mut order.group_name),
            (&self.cost_method, &mut order.cost_method),
            (&self.unit_type, &mut order.unit_type),
            (&self.billable_third_party_server, &mut order.billable_third_party_server),
            (&self.dma, &mut order.dma),
            (&self.state, &mut order.state),
            (&self.congressional_district, &mut order.congressional_district),
        ];
        for (value, target) in texts {
            if let Some(value) = value {
                *target = value.to_owned();
            }
        }
        if let Some(can_output) = self.can_output {
            order.can_output = can_output;
        }
        if let Some(can_invoice) = self.can_invoice {
            order.can_invoice = can_invoice;
        }
    }
}

/// Settings of one category's output template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryConfig {
    /// Template path or `file://` URL
    pub template: Option<String>,
    pub sheet_name: Option<String>,
    pub header_row_index: Option<usize>,
    pub output_name: Option<String>,
    pub layout: LayoutKind,
    /// Display names of the output columns, for the fixed layout
    pub columns: Option<Vec<String>>,
    pub order: OrderConfig,
}

/// The configuration file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory relative template locations are resolved against
    pub templates_dir: Option<PathBuf>,
    /// Only `xlsx` is written
    pub output_format: Option<String>,
    /// Header row index applied to every category without its own
    pub header_row_index: Option<usize>,
    /// Category of rows that neither their text nor the file name route
    pub default_category: Option<String>,
    pub categories: BTreeMap<String, CategoryConfig>,
}

impl Config {
    /// Loads a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConverterError> {
        let path = path.as_ref();
        let prefix = format!("Failed to load config '{}'", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(ConverterError::from)
            .with_prefix(&prefix)?;
        Self::parse(&text).with_prefix(&prefix)
    }

    pub fn parse(text: &str) -> Result<Self, ConverterError> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the category registry from the built-in defaults and this configuration.
    pub fn registry(&self) -> Result<Registry, ConverterError> {
        if let Some(format) = &self.output_format {
            if !format.trim().eq_ignore_ascii_case("xlsx") {
                Err(TemplateError::UnsupportedOutputFormat(format.to_owned()))?;
            }
        }

        let mut registry = Registry::default();
        if let Some(header_row_index) = self.header_row_index {
            registry = registry.with_header_row_index(header_row_index);
        }
        if let Some(name) = &self.default_category {
            registry = registry.with_default_category(parse_category(name)?);
        }
        for (name, settings) in &self.categories {
            let category = parse_category(name)?;
            let template = registry.get_mut(category);
            if let Some(location) = &settings.template {
                template.location = location.to_owned();
            }
            if let Some(sheet_name) = &settings.sheet_name {
                template.sheet_name = sheet_name.to_owned();
            }
            if let Some(header_row_index) = settings.header_row_index {
                template.header_row_index = header_row_index;
            }
            if let Some(output_name) = &settings.output_name {
                template.output_name = output_name.to_owned();
            }
            template.layout = match (settings.layout, &settings.columns) {
                (LayoutKind::Header, Some(_)) => Err(ConfigError::ConflictingLayout(category))?,
                (LayoutKind::Header, None) => ColumnLayout::FromHeaderRow,
                (LayoutKind::Fixed, Some(columns)) => ColumnLayout::Fixed(parse_columns(category, columns)?),
                (LayoutKind::Fixed, None) => ColumnLayout::default(),
            };
            settings.order.apply(&mut template.order);
        }
        Ok(registry)
    }
}

fn parse_category(name: &str) -> Result<DestinationCategory, ConfigError> {
    name.parse::<DestinationCategory>()
        .map_err(|_| ConfigError::UnknownCategory(name.to_owned()))
}

fn parse_columns(category: DestinationCategory, columns: &[String]) -> Result<Vec<OutputField>, ConfigError> {
    columns
        .iter()
        .map(|column| {
            column
                .parse::<OutputField>()
                .map_err(|_| ConfigError::UnknownColumn(category, column.to_owned()))
        })
        .collect()
}
