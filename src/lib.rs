//! # Rusty Schedule
//!
//! Converts loosely structured media schedules into fixed-layout order
//! templates, one output workbook per destination category.
//!
//! ## Pipeline
//!
//! - **Header location**: the schedule header may sit anywhere in the first
//!   sheet; it is the top-most row holding a `MARKETS` cell and at least one
//!   other schedule keyword.
//! - **Column mapping**: header cells are matched to canonical fields by an
//!   ordered keyword rule table.
//! - **Row extraction**: rows below the header are coerced into dates and
//!   amounts, with skip and early-stop rules for noise rows.
//! - **Classification**: each row is routed to Spectrum or Effectv by keyword
//!   signals in its text, then in the file name, then by default.
//! - **Projection**: each category's rows replace the data rows of its
//!   template workbook; everything at or above the header row is kept as is.
//!
//! Input documents are Office Open XML (`.xlsx`, `.xlsm`) or legacy Excel
//! 97-2003 (`.xls`) workbooks. Templates and outputs are Office Open XML.
//!
//! ```no_run
//! use rusty_schedule::FileTemplateSource;
//! use rusty_schedule::Pipeline;
//! use rusty_schedule::Registry;
//!
//! let pipeline = Pipeline::new(Registry::default(), FileTemplateSource::new("templates"));
//! let bytes = std::fs::read("io.xlsx")?;
//! let (documents, report) = pipeline.convert("io.xlsx", bytes)?;
//! for document in documents {
//!     std::fs::write(&document.file_name, &document.bytes)?;
//! }
//! println!("{} lines", report.lines_extracted);
//! # Ok::<(), rusty_schedule::ConverterError>(())
//! ```
pub mod config;
pub mod error;
mod helpers;
pub mod pipeline;
pub mod schedule;
pub mod spreadsheet;
pub mod template;

pub use config::Config;
pub use error::ConverterError;
pub use error::ResultMessage;
pub use pipeline::ConversionReport;
pub use pipeline::DirectorySink;
pub use pipeline::OutputDocument;
pub use pipeline::OutputSink;
pub use pipeline::Pipeline;
pub use schedule::DestinationCategory;
pub use schedule::NormalizedLine;
pub use template::FileTemplateSource;
pub use template::MemoryTemplateSource;
pub use template::Registry;
pub use template::TemplateError;
pub use template::TemplateSource;
