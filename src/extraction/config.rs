//! Extraction configuration.
//!
//! Every heuristic the extractors apply (where to look, which keywords mark a
//! section or a total, which columns hold quantities) comes from here. The
//! defaults describe the estimate workbooks this crate was written against:
//! inputs in `A1:T100`, category names in column A, price, quantity and cost
//! in the three columns to their right.

use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use regex::Regex;
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{0}' is not a cell range")]
    RangeError(String),

    #[error("'{0}' is not a column")]
    ColumnError(String),

    #[error("'{0}' is not a cell reference")]
    ReferenceError(String),

    #[error("Unknown read mode '{0}', expected 'raw' or 'computed'")]
    ReadModeError(String),
}

/// An inclusive rectangle of 1-based rows and columns
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanBounds {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl ScanBounds {
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        ScanBounds {
            first_row: first_row.max(1),
            first_col: first_col.max(1),
            last_row,
            last_col,
        }
    }

    /// Every cell of the sheet
    pub fn all() -> Self {
        ScanBounds::new(1, 1, u32::MAX, u32::MAX)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row) && (self.first_col..=self.last_col).contains(&col)
    }
}

impl Display for ScanBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            index_to_reference(self.first_row, self.first_col),
            index_to_reference(self.last_row, self.last_col)
        )
    }
}

impl TryFrom<&str> for ScanBounds {
    type Error = ConfigError;

    /// Parses an A1 range.
    ///
    /// Supports `A1:T100`, open ends such as `A1:` or `:T100`, whole columns
    /// (`A:D`), whole rows (`1:40`) and single cells (`B3`).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern");
        let normalized = value.trim().replace('$', "").to_ascii_uppercase();
        let captures = pattern
            .captures(&normalized)
            .filter(|captures| !captures[0].is_empty())
            .ok_or_else(|| ConfigError::RangeError(value.to_owned()))?;
        let part = |index: usize| captures.get(index).map(|m| m.as_str()).filter(|text| !text.is_empty());
        let col = |index: usize| part(index).map(|letters| col_to_index(letters).ok_or_else(|| ConfigError::RangeError(value.to_owned()))).transpose();
        let row = |index: usize| part(index).map(|digits| digits.parse::<u32>().ok().filter(|row| *row > 0).ok_or_else(|| ConfigError::RangeError(value.to_owned()))).transpose();

        let first_col = col(1)?;
        let first_row = row(2)?;
        let (last_col, last_row) = if captures.get(3).is_some() {
            (col(4)?, row(5)?)
        } else {
            // A single cell, row or column
            (first_col, first_row)
        };
        Ok(ScanBounds::new(
            first_row.unwrap_or(1),
            first_col.unwrap_or(1),
            last_row.unwrap_or(u32::MAX),
            last_col.unwrap_or(u32::MAX),
        ))
    }
}

/// Parses a column given as letters (`D`) or a 1-based number (`4`)
pub fn parse_column(text: &str) -> Result<u32, ConfigError> {
    let text = text.trim();
    text.parse::<u32>()
        .ok()
        .filter(|col| *col > 0)
        .or_else(|| col_to_index(text))
        .ok_or_else(|| ConfigError::ColumnError(text.to_owned()))
}

/// Parses a single-cell reference such as `D25` to (row, col)
pub fn parse_reference(text: &str) -> Result<(u32, u32), ConfigError> {
    reference_to_index(text).ok_or_else(|| ConfigError::ReferenceError(text.to_owned()))
}

/// Relative position of a value cell from its label cell
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Offset {
    pub delta_row: i32,
    pub delta_col: i32,
}

impl Default for Offset {
    fn default() -> Self {
        Offset {
            delta_row: 0,
            delta_col: 1,
        }
    }
}

/// Case-insensitive substring keywords, kept in priority order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeywordSet {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    /// The first keyword, in list order, contained in `text`
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let text = text.trim().to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Label-value pairing rules
#[derive(Clone, Debug, PartialEq)]
pub struct PairingRules {
    pub bounds: ScanBounds,
    pub offset: Offset,
}

impl Default for PairingRules {
    fn default() -> Self {
        PairingRules {
            bounds: ScanBounds::new(1, 1, 100, 20),
            offset: Offset::default(),
        }
    }
}

/// Columns read for each line item, as offsets from the section column
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItemColumns {
    pub description: i32,
    pub quantity: i32,
    pub unit_price: i32,
    pub total: i32,
    /// Further value columns scanned after the three above
    pub extra: Vec<i32>,
}

impl LineItemColumns {
    /// Value column offsets in left-to-right order, without duplicates
    pub fn value_offsets(&self) -> Vec<i32> {
        let mut offsets: Vec<i32> = [self.quantity, self.unit_price, self.total]
            .into_iter()
            .chain(self.extra.iter().copied())
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

impl Default for LineItemColumns {
    fn default() -> Self {
        LineItemColumns {
            description: 0,
            quantity: 1,
            unit_price: 2,
            total: 3,
            extra: Vec::new(),
        }
    }
}

/// Cost category names that open a section
pub const DEFAULT_HEADER_KEYWORDS: &[&str] = &[
    "EXCAVATION", "PLUMBING", "STEEL", "ELECTRICAL", "SHOTCRETE", "TILE", "COPING", "DECKING",
    "EQUIPMENT", "INTERIOR", "CLEANUP", "STONE", "ROCKWORK", "PLANS", "ENGINEERING", "LAYOUT",
    "PERMIT", "GAS", "DRAINAGE", "WATER FEATURES", "STARTUP", "ORIENTATION",
];

pub const DEFAULT_TOTAL_KEYWORDS: &[&str] = &["TOTAL", "SUBTOTAL"];

pub const DEFAULT_SCAN_KEYWORDS: &[&str] = &[
    "total", "subtotal", "cost", "price", "labor", "material", "job cost", "grand total",
];

/// Section segmentation and line item rules
#[derive(Clone, Debug, PartialEq)]
pub struct SectionRules {
    /// Column holding section names and descriptions
    pub column: u32,
    pub first_row: u32,
    pub last_row: u32,
    pub header_keywords: KeywordSet,
    pub total_keywords: KeywordSet,
    pub columns: LineItemColumns,
}

impl Default for SectionRules {
    fn default() -> Self {
        SectionRules {
            column: 1,
            first_row: 1,
            last_row: 500,
            header_keywords: KeywordSet::new(DEFAULT_HEADER_KEYWORDS),
            total_keywords: KeywordSet::new(DEFAULT_TOTAL_KEYWORDS),
            columns: LineItemColumns::default(),
        }
    }
}

/// Keyword scan rules
#[derive(Clone, Debug, PartialEq)]
pub struct KeywordRules {
    pub bounds: ScanBounds,
    pub offset: Offset,
    pub keywords: KeywordSet,
}

impl Default for KeywordRules {
    fn default() -> Self {
        KeywordRules {
            bounds: ScanBounds::new(1, 1, 200, 26),
            offset: Offset::default(),
            keywords: KeywordSet::new(DEFAULT_SCAN_KEYWORDS),
        }
    }
}

/// A named summary cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    pub row: u32,
    pub col: u32,
}

impl Anchor {
    pub fn new(name: &str, row: u32, col: u32) -> Self {
        Anchor {
            name: name.to_owned(),
            row,
            col,
        }
    }

    /// Builds an anchor from a name and an A1 reference
    pub fn at(name: &str, reference: &str) -> Result<Self, ConfigError> {
        let (row, col) = parse_reference(reference)?;
        Ok(Anchor::new(name, row, col))
    }
}

/// How anchors are found when none are configured: every label in `column`
/// matching `keywords` names the value in `value_col` on the same row
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorDiscovery {
    pub column: u32,
    pub first_row: u32,
    pub last_row: u32,
    pub keywords: KeywordSet,
    pub value_col: u32,
}

impl Default for AnchorDiscovery {
    fn default() -> Self {
        AnchorDiscovery {
            column: 1,
            first_row: 1,
            last_row: 100,
            keywords: KeywordSet::new(["TOTAL"]),
            value_col: 4,
        }
    }
}

/// Summary rollup rules
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryRules {
    /// Explicit anchors; discovery runs only when this is empty
    pub anchors: Vec<Anchor>,
    pub discovery: AnchorDiscovery,
}

/// Configuration of one extraction pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionConfig {
    pub pairing: PairingRules,
    pub sections: SectionRules,
    pub keywords: KeywordRules,
    pub summary: SummaryRules,
}
