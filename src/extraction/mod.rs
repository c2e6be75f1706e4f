//! # Layout Extraction
//!
//! Turns a loosely structured estimate sheet into typed records. Each pass
//! reads the sheet independently:
//!
//! - [`label_value::pair_labels`] pairs text labels with the cell next to them
//! - [`section::segment`] and [`line_item::extract_line_items`] cut the sheet
//!   into cost sections and interpret their rows
//! - [`keyword::scan_keywords`] finds cells mentioning cost keywords
//! - [`summary::summarize`] reads the named totals
//!
//! [`extract`] runs all of them over one sheet.
pub mod config;
pub mod keyword;
pub mod label_value;
pub mod line_item;
pub mod section;
pub mod summary;

use crate::error::EstimateSheetError;
use crate::extraction::config::ExtractionConfig;
use crate::extraction::config::ScanBounds;
use crate::extraction::keyword::scan_keywords;
use crate::extraction::keyword::KeywordScan;
use crate::extraction::label_value::pair_labels;
use crate::extraction::label_value::LabelValueRecord;
use crate::extraction::line_item::extract_line_items;
use crate::extraction::line_item::Section;
use crate::extraction::section::segment;
use crate::extraction::summary::summarize;
use crate::extraction::summary::SummaryEntry;
use crate::extraction::summary::SummaryIssue;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::Workbook;
use tracing::info;
use tracing::warn;

/// A recoverable anomaly found during extraction
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// A formula read in computed mode had no cached result and read as empty
    StaleValue(Coordinate),
    /// A keyword label whose value offset falls off the sheet
    ValueOffSheet(Coordinate),
    /// A summary anchor did not hold a number
    SummaryDefaulted {
        name: String,
        anchor: Coordinate,
        issue: SummaryIssue,
    },
}

/// Everything extracted from one sheet
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub sheet: String,
    pub mode: ReadMode,
    pub label_values: Vec<LabelValueRecord>,
    pub sections: Vec<Section>,
    pub keyword_matches: KeywordScan,
    pub summary: Vec<SummaryEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs every pass over one sheet
pub fn extract(sheet: &Worksheet, config: &ExtractionConfig) -> Extraction {
    let label_values = pair_labels(sheet, &config.pairing);
    let sections = segment(sheet, &config.sections)
        .iter()
        .map(|section| extract_line_items(sheet, section, &config.sections))
        .collect();
    let keyword_matches = scan_keywords(sheet, &config.keywords);
    let summary = summarize(sheet, &config.summary);

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    if sheet.mode == ReadMode::Computed {
        diagnostics.extend(sheet.stale_cells(&ScanBounds::all()).into_iter().map(Diagnostic::StaleValue));
    }
    diagnostics.extend(
        keyword_matches
            .matches()
            .iter()
            .filter(|found| found.value_coord.is_none())
            .map(|found| Diagnostic::ValueOffSheet(found.label_coord.to_owned())),
    );
    diagnostics.extend(summary.iter().filter_map(|entry| {
        entry.issue.as_ref().map(|issue| Diagnostic::SummaryDefaulted {
            name: entry.name.to_owned(),
            anchor: entry.anchor.to_owned(),
            issue: issue.to_owned(),
        })
    }));

    info!(
        sheet = %sheet.name,
        labels = label_values.len(),
        keywords = keyword_matches.matches().len(),
        diagnostics = diagnostics.len(),
        "extracted sheet"
    );
    Extraction {
        sheet: sheet.name.to_owned(),
        mode: sheet.mode,
        label_values,
        sections,
        keyword_matches,
        summary,
        diagnostics,
    }
}

/// Extracts several sheets of one workbook.
///
/// A sheet that cannot be loaded fails on its own; the remaining sheets are
/// still extracted. Results follow the order of `sheet_names`.
pub fn extract_workbook(
    workbook: &mut Workbook,
    sheet_names: &[String],
    config: &ExtractionConfig,
) -> Vec<(String, Result<Extraction, EstimateSheetError>)> {
    sheet_names
        .iter()
        .map(|name| {
            let result = workbook.sheet(Some(name.as_str())).map(|sheet| extract(&sheet, config));
            if let Err(error) = &result {
                warn!(sheet = %name, %error, "skipping sheet");
            }
            (name.to_owned(), result)
        })
        .collect()
}
