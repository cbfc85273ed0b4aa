//! Projects normalized lines into the data region of a destination template.
//!
//! The template package is an immutable snapshot: rows at or above the header
//! row are carried over untouched and only the rows below it are replaced.
use crate::error::ConverterError;
use crate::schedule::coerce::format_us_date;
use crate::schedule::DestinationCategory;
use crate::schedule::NormalizedLine;
use crate::spreadsheet::writer::replace_sheet_rows;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::OutputValue;
use crate::spreadsheet::XlsxWorkbook;
use crate::template::OutputField;
use crate::template::TemplateError;
use serde::Serialize;
use tracing::debug;

/// Order-level values repeated on every projected row of a category.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderHeader {
    /// Diagnostics only, never written into the template
    pub order_id: String,
    pub media_plan_name: String,
    pub section_name: String,
    pub product_name: String,
    pub group_name: String,
    pub cost_method: String,
    pub unit_type: String,
    pub can_output: bool,
    pub can_invoice: bool,
    pub billable_third_party_server: String,
    pub dma: String,
    pub state: String,
    pub congressional_district: String,
}

impl OrderHeader {
    /// Default order values for a category.
    pub fn for_category(category: DestinationCategory) -> Self {
        Self {
            order_id: String::new(),
            media_plan_name: "Default Media Plan".to_owned(),
            section_name: "Default Section".to_owned(),
            product_name: category.name().to_owned(),
            group_name: String::new(),
            cost_method: "CPM".to_owned(),
            unit_type: "Impressions".to_owned(),
            can_output: true,
            can_invoice: true,
            billable_third_party_server: String::new(),
            dma: String::new(),
            state: String::new(),
            congressional_district: String::new(),
        }
    }
}

/// Net unit cost of a line.
///
/// CPM lines cost per thousand units, 0 when there are no units. Any other cost
/// method carries the net investment unchanged.
pub fn net_unit_cost(cost_method: &str, net_investment: f64, quantity: f64) -> f64 {
    if !cost_method.trim().eq_ignore_ascii_case("CPM") {
        net_investment
    } else if quantity > 0.0 {
        net_investment / (quantity / 1000.0)
    } else {
        0.0
    }
}

fn flag(value: bool) -> OutputValue {
    OutputValue::text(if value { "TRUE" } else { "FALSE" })
}

/// Output value of one field for one line.
fn field_value(field: OutputField, line: &NormalizedLine, order: &OrderHeader) -> OutputValue {
    match field {
        OutputField::MediaPlanName => OutputValue::text(&order.media_plan_name),
        OutputField::SectionName => OutputValue::text(&order.section_name),
        OutputField::StartDate => OutputValue::text(format_us_date(line.start_date)),
        OutputField::EndDate => OutputValue::text(format_us_date(line.end_date)),
        OutputField::LineItemName => OutputValue::text(&line.line_item_name),
        OutputField::GroupName => OutputValue::text(&order.group_name),
        OutputField::ProductName => OutputValue::text(&order.product_name),
        OutputField::AgencyDiscount => OutputValue::Number(0.0),
        OutputField::NetUnitCost => {
            OutputValue::Number(net_unit_cost(&order.cost_method, line.net_investment, line.quantity))
        }
        OutputField::CostMethod => OutputValue::text(&order.cost_method),
        OutputField::UnitType => OutputValue::text(&order.unit_type),
        OutputField::Quantity => OutputValue::Number(line.quantity),
        OutputField::CanOutput => flag(order.can_output),
        OutputField::CanInvoice => flag(order.can_invoice),
        OutputField::BillableThirdPartyServer => OutputValue::text(&order.billable_third_party_server),
        OutputField::Dma => OutputValue::text(&order.dma),
        OutputField::State => OutputValue::text(&order.state),
        OutputField::CongressionalDistrict => OutputValue::text(&order.congressional_district),
        OutputField::Targeting => OutputValue::text(&line.targeting),
        OutputField::Blank => OutputValue::text(""),
    }
}

/// One output row per line, in input order, with values placed by `columns`.
pub fn project_lines(lines: &[NormalizedLine], order: &OrderHeader, columns: &[OutputField]) -> Vec<Vec<OutputValue>> {
    lines
        .iter()
        .map(|line| columns.iter().map(|field| field_value(*field, line, order)).collect())
        .collect()
}

/// A destination template opened for projection.
#[derive(Debug)]
pub struct TemplateDocument {
    name: String,
    bytes: Vec<u8>,
    sheet_path: String,
    header_row_index: usize,
    header: Vec<CellValue>,
}

impl TemplateDocument {
    /// Opens a template and locates its data region sheet.
    ///
    /// # Errors
    /// `MissingDataRegion` when the workbook has no sheet named `sheet_name`.
    pub fn open(name: &str, bytes: Vec<u8>, sheet_name: &str, header_row_index: usize) -> Result<Self, ConverterError> {
        let mut workbook = XlsxWorkbook::from_bytes(name, bytes.clone())?;
        let sheet_path = workbook
            .sheet_path(sheet_name)
            .map(str::to_owned)
            .ok_or_else(|| TemplateError::MissingDataRegion(name.to_owned(), sheet_name.to_owned()))?;
        let grid = workbook.sheet(sheet_name)?;
        let header = grid.row(header_row_index).to_vec();
        debug!(template = name, sheet = sheet_name, %sheet_path, header_row_index, "opened template");
        Ok(Self {
            name: name.to_owned(),
            bytes,
            sheet_path,
            header_row_index,
            header,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cells of the template's header row.
    pub fn header_row(&self) -> &[CellValue] {
        &self.header
    }

    /// A copy of the template with every row below the header replaced by `rows`.
    pub fn replace_data_rows(&self, rows: &[Vec<OutputValue>]) -> Result<Vec<u8>, ConverterError> {
        replace_sheet_rows(&self.bytes, &self.sheet_path, self.header_row_index, rows)
    }
}
