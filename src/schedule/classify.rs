//! Routes extracted rows to destination categories by keyword signals.
use crate::schedule::extract::ExtractedRow;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// The destination an output row is routed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DestinationCategory {
    Spectrum,
    Effectv,
}

/// Category chosen when neither the row nor the file name decide, unless
/// configured otherwise.
pub const DEFAULT_CATEGORY: DestinationCategory = DestinationCategory::Spectrum;

/// Lowercase substrings that signal each category, in evaluation order.
pub const CATEGORY_SIGNALS: &[(DestinationCategory, &[&str])] = &[
    (DestinationCategory::Spectrum, &["spectrum", "charter", "spectrum reach", "spectrumreach"]),
    (DestinationCategory::Effectv, &["effectv", "comcast", "xfinity"]),
];

impl DestinationCategory {
    /// All categories in declaration order.
    pub const ALL: [DestinationCategory; 2] = [Self::Spectrum, Self::Effectv];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spectrum => "Spectrum",
            Self::Effectv => "Effectv",
        }
    }
}

impl Display for DestinationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DestinationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Categories whose signals appear in `text`, which must already be lowercase.
fn matching_categories(text: &str) -> Vec<DestinationCategory> {
    CATEGORY_SIGNALS
        .iter()
        .filter(|(_, signals)| signals.iter().any(|signal| text.contains(signal)))
        .map(|(category, _)| *category)
        .collect()
}

/// The single category signalled by `text`, or `None` when zero or several are.
fn decide(text: &str) -> Option<DestinationCategory> {
    match matching_categories(text).as_slice() {
        [category] => Some(*category),
        _ => None,
    }
}

/// Assigns a category from the row text, then the file name, then `default`.
pub fn classify(row: &ExtractedRow, file_name: &str, default: DestinationCategory) -> DestinationCategory {
    let blob = [
        row.market.as_str(),
        row.property.as_str(),
        row.placement.as_str(),
        row.line_item_name.as_str(),
        row.targeting.as_str(),
    ]
    .join(" ")
    .to_lowercase();

    if let Some(category) = decide(&blob) {
        return category;
    }
    if let Some(category) = decide(&file_name.to_lowercase()) {
        debug!(row = row.source_row_index, file_name, category = %category, "classified by file name");
        return category;
    }
    debug!(row = row.source_row_index, category = %default, "classified by default");
    default
}
