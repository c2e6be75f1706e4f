use crate::extraction::config::KeywordRules;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct KeywordMatch {
    /// Keyword that matched, lowercased
    pub keyword: String,
    pub label_coord: Coordinate,
    /// Trimmed label text as found
    pub label_text: String,
    /// Cell at the rule offset, `None` when the offset falls off the sheet
    pub value_coord: Option<Coordinate>,
    /// Cell at the rule offset, `Empty` when missing or off the sheet
    pub value: CellValue,
}

/// Outcome of scanning one sheet
#[derive(Clone, Debug, PartialEq)]
pub enum KeywordScan {
    NoMatches,
    Matches(Vec<KeywordMatch>),
}

impl KeywordScan {
    pub fn matches(&self) -> &[KeywordMatch] {
        match self {
            KeywordScan::NoMatches => &[],
            KeywordScan::Matches(matches) => matches,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, KeywordScan::NoMatches)
    }
}

/// Finds text cells containing a keyword and reads the cell at the rule offset.
///
/// When a label contains several keywords the first one in keyword list order
/// is reported. A label whose offset falls off the sheet is still reported,
/// with no value cell.
pub fn scan_keywords(sheet: &Worksheet, rules: &KeywordRules) -> KeywordScan {
    let mut matches = Vec::new();
    for cell in sheet.cells_in(&rules.bounds) {
        let value = sheet.cell(cell.row, cell.col);
        let Some(label_text) = value.as_text().map(str::trim) else {
            continue;
        };
        let Some(keyword) = rules.keywords.first_match(label_text) else {
            continue;
        };

        let label_coord = sheet.coordinate(cell.row, cell.col);
        let value_coord = label_coord.offset(rules.offset.delta_row, rules.offset.delta_col);
        let value = match &value_coord {
            Some(coord) => sheet.cell(coord.row, coord.col),
            None => {
                debug!(label = %label_coord, "keyword value offset falls off the sheet");
                CellValue::Empty
            }
        };
        matches.push(KeywordMatch {
            keyword: keyword.to_owned(),
            label_text: label_text.to_owned(),
            value,
            label_coord,
            value_coord,
        });
    }
    debug!(sheet = %sheet.name, bounds = %rules.bounds, matches = matches.len(), "scanned keywords");

    if matches.is_empty() {
        KeywordScan::NoMatches
    } else {
        KeywordScan::Matches(matches)
    }
}
