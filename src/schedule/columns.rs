//! Maps header text to canonical schedule fields.
//!
//! Matching is driven by [`COLUMN_RULES`], an ordered table of (field, rules)
//! pairs. Every field is searched independently left to right and the first
//! matching cell wins, so two fields may bind to the same column when a header
//! is poorly named.
use crate::schedule::header::normalize_header;
use crate::spreadsheet::CellValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::debug;

/// The fixed set of semantic fields a schedule row is normalized into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalField {
    Market,
    Property,
    Placement,
    Target,
    StartDate,
    EndDate,
    ImpressionsOrUnits,
    NetInvestment,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        Self::Market,
        Self::Property,
        Self::Placement,
        Self::Target,
        Self::StartDate,
        Self::EndDate,
        Self::ImpressionsOrUnits,
        Self::NetInvestment,
    ];
}

impl Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Market => "MARKET",
            Self::Property => "PROPERTY",
            Self::Placement => "PLACEMENT",
            Self::Target => "TARGET",
            Self::StartDate => "START_DATE",
            Self::EndDate => "END_DATE",
            Self::ImpressionsOrUnits => "IMPRESSIONS_OR_UNITS",
            Self::NetInvestment => "NET_INVESTMENT",
        };
        f.write_str(name)
    }
}

/// A keyword predicate over normalized (trimmed, upper-cased) header text.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum KeywordRule {
    Exactly(&'static str),
    Contains(&'static str),
    ContainsAll(&'static [&'static str]),
}

impl KeywordRule {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exactly(keyword) => text == *keyword,
            Self::Contains(keyword) => text.contains(keyword),
            Self::ContainsAll(keywords) => keywords.iter().all(|keyword| text.contains(keyword)),
        }
    }
}

/// Header matching rules; a field matches a cell when any of its rules holds.
pub const COLUMN_RULES: &[(CanonicalField, &[KeywordRule])] = &[
    (CanonicalField::Market, &[KeywordRule::Exactly("MARKETS"), KeywordRule::Contains("MARKET")]),
    (CanonicalField::Property, &[KeywordRule::Exactly("PROPERTY")]),
    (CanonicalField::Placement, &[KeywordRule::Exactly("PLACEMENT"), KeywordRule::Contains("PLACEMENT")]),
    (CanonicalField::Target, &[KeywordRule::Exactly("TARGET"), KeywordRule::Contains("TARGET")]),
    (CanonicalField::StartDate, &[KeywordRule::ContainsAll(&["START", "DATE"])]),
    (CanonicalField::EndDate, &[KeywordRule::ContainsAll(&["END", "DATE"])]),
    (CanonicalField::ImpressionsOrUnits, &[KeywordRule::Contains("IMP"), KeywordRule::Contains("UNITS")]),
    (CanonicalField::NetInvestment, &[KeywordRule::ContainsAll(&["NET", "INVEST"])]),
];

/// Column position of each canonical field found in a header row.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColumnIndexMap {
    columns: BTreeMap<CanonicalField, usize>,
}

impl ColumnIndexMap {
    /// Zero-based column of a field, or `None` when the header has no such column.
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub(crate) fn insert(&mut self, field: CanonicalField, column: usize) {
        self.columns.insert(field, column);
    }
}

/// Builds the column map for a header row.
pub fn map_columns(header: &[CellValue]) -> ColumnIndexMap {
    let cells: Vec<String> = header.iter().map(normalize_header).collect();
    let mut map = ColumnIndexMap::default();
    for (field, rules) in COLUMN_RULES {
        let found = cells
            .iter()
            .position(|cell| rules.iter().any(|rule| rule.matches(cell)));
        match found {
            Some(column) => {
                debug!(field = %field, column, header = %cells[column], "mapped column");
                map.insert(*field, column);
            }
            None => debug!(field = %field, "no matching column"),
        }
    }
    map
}
