//! # Template Module
//!
//! Everything on the output side of a conversion: the per-category registry of
//! output templates, the column layouts they use, where template bytes come
//! from, and the projection of normalized lines into a template's data region.
use crate::schedule::DestinationCategory;
use thiserror::Error;

pub mod layout;
pub mod projector;
pub mod registry;
pub mod source;

pub use layout::ColumnLayout;
pub use layout::OutputField;
pub use projector::net_unit_cost;
pub use projector::project_lines;
pub use projector::OrderHeader;
pub use projector::TemplateDocument;
pub use registry::OutputTemplate;
pub use registry::Registry;
pub use source::FileTemplateSource;
pub use source::MemoryTemplateSource;
pub use source::TemplateSource;

/// Errors at the template boundary. Each one is fatal for its category.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template bytes are available for a category present in the input
    #[error("Template for {0} not found at '{1}'")]
    MissingTemplate(DestinationCategory, String),

    /// The template lacks the sheet holding its data region
    #[error("Template '{0}' has no data region sheet '{1}'")]
    MissingDataRegion(String, String),

    /// The template's header row is empty and its layout reads columns from it
    #[error("Template '{0}' has no header columns at row {1}")]
    MissingHeaderColumns(String, usize),

    #[error("Unsupported template location '{0}'")]
    UnsupportedLocation(String),

    /// Output format other than Office Open XML
    #[error("Unsupported output format '{0}'")]
    UnsupportedOutputFormat(String),
}
