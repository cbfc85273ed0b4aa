//! Output column layouts of a destination template.
use crate::error::ConverterError;
use crate::schedule::coerce::coerce_text;
use crate::spreadsheet::CellValue;
use crate::template::TemplateError;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// A value a template column can receive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OutputField {
    MediaPlanName,
    SectionName,
    StartDate,
    EndDate,
    LineItemName,
    GroupName,
    ProductName,
    AgencyDiscount,
    NetUnitCost,
    CostMethod,
    UnitType,
    Quantity,
    CanOutput,
    CanInvoice,
    BillableThirdPartyServer,
    Dma,
    State,
    CongressionalDistrict,
    Targeting,
    /// Always an empty string
    Blank,
}

impl OutputField {
    const NAMED: [OutputField; 19] = [
        Self::MediaPlanName,
        Self::SectionName,
        Self::StartDate,
        Self::EndDate,
        Self::LineItemName,
        Self::GroupName,
        Self::ProductName,
        Self::AgencyDiscount,
        Self::NetUnitCost,
        Self::CostMethod,
        Self::UnitType,
        Self::Quantity,
        Self::CanOutput,
        Self::CanInvoice,
        Self::BillableThirdPartyServer,
        Self::Dma,
        Self::State,
        Self::CongressionalDistrict,
        Self::Targeting,
    ];

    /// Header text of the column in the destination template.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MediaPlanName => "Media Plan Name",
            Self::SectionName => "Section Name",
            Self::StartDate => "Start Date",
            Self::EndDate => "End Date",
            Self::LineItemName => "Line Item Name",
            Self::GroupName => "Group Name",
            Self::ProductName => "Product Name",
            Self::AgencyDiscount => "Agency Discount",
            Self::NetUnitCost => "Net Unit Cost",
            Self::CostMethod => "Cost Method",
            Self::UnitType => "Unit Type",
            Self::Quantity => "Quantity",
            Self::CanOutput => "Can Output",
            Self::CanInvoice => "Can Invoice",
            Self::BillableThirdPartyServer => "Billable Third Party Server",
            Self::Dma => "DMA",
            Self::State => "State",
            Self::CongressionalDistrict => "Congressional District",
            Self::Targeting => "Targeting",
            Self::Blank => "",
        }
    }

    /// Field whose display name matches `text` (trimmed, case-insensitive), else `Blank`.
    pub fn from_header_text(text: &str) -> Self {
        let text = text.trim();
        Self::NAMED
            .into_iter()
            .find(|field| field.display_name().eq_ignore_ascii_case(text))
            .unwrap_or(Self::Blank)
    }
}

impl Display for OutputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => f.write_str("(blank)"),
            _ => f.write_str(self.display_name()),
        }
    }
}

impl FromStr for OutputField {
    type Err = String;

    /// Parses a display name; an empty string is `Blank`, unknown names are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::Blank);
        }
        match Self::from_header_text(s) {
            Self::Blank => Err(format!("unknown output column '{s}'")),
            field => Ok(field),
        }
    }
}

/// The 27-column order of the standard order template.
pub const DEFAULT_COLUMNS: [OutputField; 27] = [
    OutputField::MediaPlanName,
    OutputField::SectionName,
    OutputField::StartDate,
    OutputField::EndDate,
    OutputField::LineItemName,
    OutputField::GroupName,
    OutputField::ProductName,
    OutputField::AgencyDiscount,
    OutputField::NetUnitCost,
    OutputField::CostMethod,
    OutputField::UnitType,
    OutputField::Quantity,
    OutputField::CanOutput,
    OutputField::CanInvoice,
    OutputField::BillableThirdPartyServer,
    OutputField::Dma,
    OutputField::State,
    OutputField::CongressionalDistrict,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Blank,
    OutputField::Targeting,
    OutputField::Blank,
];

/// How a template's output column order is determined.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnLayout {
    /// A configured column order
    Fixed(Vec<OutputField>),
    /// The order of the template's own header row, matched by display name
    FromHeaderRow,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::Fixed(DEFAULT_COLUMNS.to_vec())
    }
}

impl ColumnLayout {
    /// Resolves the column order against the template's header row.
    pub fn resolve(
        &self,
        template_name: &str,
        header_row_index: usize,
        header: &[CellValue],
    ) -> Result<Vec<OutputField>, ConverterError> {
        match self {
            Self::Fixed(columns) => Ok(columns.to_owned()),
            Self::FromHeaderRow => {
                let texts: Vec<String> = header.iter().map(coerce_text).collect();
                // trailing blank header cells are not columns
                let width = texts.iter().rposition(|text| !text.is_empty()).map_or(0, |last| last + 1);
                if width == 0 {
                    Err(TemplateError::MissingHeaderColumns(template_name.to_owned(), header_row_index))?;
                }
                Ok(texts[..width].iter().map(|text| OutputField::from_header_text(text)).collect())
            }
        }
    }
}
