use crate::extraction::config::KeywordSet;
use crate::extraction::config::SectionRules;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use tracing::debug;

/// Role of a row in the section column
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowKind {
    /// Opens a new section
    Header,
    /// Closing total of the open section
    Total,
    Detail,
}

/// Classifies a label.
///
/// A label matching both keyword sets is a total: total rows never open sections.
pub fn classify(text: &str, header_keywords: &KeywordSet, total_keywords: &KeywordSet) -> RowKind {
    if total_keywords.matches(text) {
        RowKind::Total
    } else if header_keywords.matches(text) {
        RowKind::Header
    } else {
        RowKind::Detail
    }
}

/// A row attributed to a section, not yet interpreted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionRow {
    /// Row number (1-based)
    pub row: u32,
    /// `Detail` or `Total`
    pub kind: RowKind,
}

/// A section as cut by the segmenter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSection {
    pub name: String,
    pub header_coord: Coordinate,
    pub rows: Vec<SectionRow>,
}

/// Splits the section column into sections.
///
/// Each header row closes the open section and starts a new one named after
/// the header text. Rows before the first header belong to no section and
/// are skipped.
pub fn segment(sheet: &Worksheet, rules: &SectionRules) -> Vec<RawSection> {
    let last_row = rules.last_row.min(sheet.used_rows());
    let mut sections = Vec::new();
    let mut current: Option<RawSection> = None;
    let mut skipped = 0usize;

    for row in rules.first_row.max(1)..=last_row {
        let value = sheet.cell(row, rules.column);
        let text = value.as_text().map(str::trim).filter(|text| !text.is_empty());
        let kind = text
            .map(|text| classify(text, &rules.header_keywords, &rules.total_keywords))
            .unwrap_or(RowKind::Detail);

        if kind == RowKind::Header {
            sections.extend(current.take());
            current = Some(RawSection {
                name: text.unwrap_or_default().to_owned(),
                header_coord: sheet.coordinate(row, rules.column),
                rows: Vec::new(),
            });
            continue;
        }
        match current.as_mut() {
            Some(section) => section.rows.push(SectionRow { row, kind }),
            None => skipped += 1,
        }
    }
    sections.extend(current);

    debug!(sheet = %sheet.name, sections = sections.len(), skipped, "segmented sections");
    sections
}
