use crate::extraction::config::Anchor;
use crate::extraction::config::AnchorDiscovery;
use crate::extraction::config::KeywordSet;
use crate::extraction::config::SummaryRules;
use crate::extraction::section::classify;
use crate::extraction::section::RowKind;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::Scalar;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use std::fmt::Display;
use tracing::debug;
use tracing::warn;

/// Why an anchor did not yield a number
#[derive(Clone, Debug, PartialEq)]
pub enum SummaryIssue {
    /// The anchor holds a literal that is not a number, kept as display text
    NonNumeric(String),
    /// The anchor holds a formula and the sheet was read raw
    Unevaluated(String),
}

impl Display for SummaryIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryIssue::NonNumeric(text) => write!(f, "non-numeric value '{text}'"),
            SummaryIssue::Unevaluated(formula) => write!(f, "unevaluated formula '{formula}'"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryEntry {
    pub name: String,
    pub anchor: Coordinate,
    pub value: f64,
    /// Zero was substituted because no number was found
    pub defaulted: bool,
    pub issue: Option<SummaryIssue>,
}

/// Reads formatted numeric text such as `$1,500.75` or `-$12`.
/// Whitespace inside the number is not a separator: `12 34` is not a number.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let digits = unsigned.strip_prefix('$').unwrap_or(unsigned);
    if digits.chars().any(char::is_whitespace) {
        return None;
    }
    format!("{sign}{}", digits.replace(',', ""))
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

fn read_entry(sheet: &Worksheet, anchor: &Anchor) -> SummaryEntry {
    let coordinate = sheet.coordinate(anchor.row, anchor.col);
    let (value, issue) = match sheet.cell(anchor.row, anchor.col) {
        CellValue::Empty => (None, None),
        CellValue::Literal(Scalar::Number(number)) => (Some(number), None),
        CellValue::Literal(Scalar::Text(text)) => match parse_number(&text) {
            Some(number) => (Some(number), None),
            None => (None, Some(SummaryIssue::NonNumeric(text))),
        },
        CellValue::Literal(scalar) => (None, Some(SummaryIssue::NonNumeric(scalar.to_string()))),
        CellValue::Formula(formula) => (None, Some(SummaryIssue::Unevaluated(formula))),
    };
    if let Some(issue) = &issue {
        warn!(name = %anchor.name, anchor = %coordinate, %issue, "summary value defaulted to zero");
    }

    SummaryEntry {
        name: anchor.name.to_owned(),
        anchor: coordinate,
        value: value.unwrap_or(0.0),
        defaulted: value.is_none(),
        issue,
    }
}

/// Reads every anchor, in anchor order.
///
/// Empty anchors read as zero with `defaulted` set. Anchors holding text that
/// is not a number, or an unevaluated formula, read as zero too and carry the
/// reason in `issue`. Duplicate names are kept.
pub fn rollup(sheet: &Worksheet, anchors: &[Anchor]) -> Vec<SummaryEntry> {
    anchors.iter().map(|anchor| read_entry(sheet, anchor)).collect()
}

/// Finds anchors from total labels in the discovery column
pub fn discover_anchors(sheet: &Worksheet, discovery: &AnchorDiscovery) -> Vec<Anchor> {
    let no_headers = KeywordSet::default();
    let last_row = discovery.last_row.min(sheet.used_rows());
    let anchors: Vec<Anchor> = (discovery.first_row.max(1)..=last_row)
        .filter_map(|row| {
            let value = sheet.cell(row, discovery.column);
            let text = value.as_text()?.trim();
            (classify(text, &no_headers, &discovery.keywords) == RowKind::Total)
                .then(|| Anchor::new(text, row, discovery.value_col))
        })
        .collect();
    debug!(sheet = %sheet.name, anchors = anchors.len(), "discovered summary anchors");
    anchors
}

/// Rolls up the configured anchors, or the discovered ones when none are configured
pub fn summarize(sheet: &Worksheet, rules: &SummaryRules) -> Vec<SummaryEntry> {
    if rules.anchors.is_empty() {
        rollup(sheet, &discover_anchors(sheet, &rules.discovery))
    } else {
        rollup(sheet, &rules.anchors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::Cell;
    use crate::spreadsheet::cell::ReadMode;

    fn text(row: u32, col: u32, text: &str) -> Cell {
        Cell::literal(row, col, Scalar::Text(text.to_owned()))
    }

    fn totals(mode: ReadMode) -> Worksheet {
        Worksheet::from_cells("Summary", mode, vec![
            text(5, 1, "EXCAVATION TOTAL"),
            Cell::literal(5, 4, Scalar::Number(1500.75)),
            text(6, 1, "PLUMBING TOTAL"),
            text(7, 1, "STEEL TOTAL"),
            text(7, 4, "$2,250.50"),
            text(8, 1, "TILE TOTAL"),
            text(8, 4, "TBD"),
            text(9, 1, "JOB TOTAL"),
            Cell::formula(9, 4, "=SUM(D5:D8)", Some(Scalar::Number(3751.25))),
        ])
    }

    #[test]
    fn test_empty_and_literal_anchors() {
        let sheet = totals(ReadMode::Computed);
        let entries = rollup(&sheet, &[
            Anchor::at("EXCAVATION", "D5").unwrap(),
            Anchor::at("PLUMBING", "D6").unwrap(),
        ]);
        assert_eq!(entries[0].value, 1500.75);
        assert!(!entries[0].defaulted);
        assert_eq!(entries[0].issue, None);
        assert_eq!(entries[1].value, 0.0);
        assert!(entries[1].defaulted);
        assert_eq!(entries[1].issue, None);
        assert_eq!(entries[1].anchor.to_string(), "Summary!D6");
    }

    #[test]
    fn test_numeric_text_and_issues() {
        let sheet = totals(ReadMode::Raw);
        let entries = rollup(&sheet, &[
            Anchor::at("STEEL", "D7").unwrap(),
            Anchor::at("TILE", "D8").unwrap(),
            Anchor::at("JOB", "D9").unwrap(),
        ]);
        assert_eq!(entries[0].value, 2250.5);
        assert!(!entries[0].defaulted);
        assert_eq!(entries[1].issue, Some(SummaryIssue::NonNumeric("TBD".to_owned())));
        assert!(entries[1].defaulted);
        assert_eq!(entries[2].issue, Some(SummaryIssue::Unevaluated("=SUM(D5:D8)".to_owned())));
        assert_eq!(entries[2].value, 0.0);
    }

    #[test]
    fn test_order_and_duplicates_kept() {
        let sheet = totals(ReadMode::Computed);
        let anchors = vec![
            Anchor::at("JOB", "D9").unwrap(),
            Anchor::at("JOB", "D9").unwrap(),
            Anchor::at("EXCAVATION", "D5").unwrap(),
        ];
        let names: Vec<_> = rollup(&sheet, &anchors).into_iter().map(|entry| (entry.name, entry.value)).collect();
        assert_eq!(names, vec![
            ("JOB".to_owned(), 3751.25),
            ("JOB".to_owned(), 3751.25),
            ("EXCAVATION".to_owned(), 1500.75),
        ]);
    }

    #[test]
    fn test_discovered_anchors() {
        let sheet = totals(ReadMode::Computed);
        let anchors = discover_anchors(&sheet, &AnchorDiscovery::default());
        assert_eq!(anchors.len(), 5);
        assert_eq!(anchors[0], Anchor::new("EXCAVATION TOTAL", 5, 4));

        let entries = summarize(&sheet, &SummaryRules::default());
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[4].value, 3751.25);

        let rules = SummaryRules {
            anchors: vec![Anchor::new("Grand", 9, 4)],
            ..SummaryRules::default()
        };
        assert_eq!(summarize(&sheet, &rules).len(), 1);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" $1,500.75 "), Some(1500.75));
        assert_eq!(parse_number("-12"), Some(-12.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("-$12"), Some(-12.0));
        assert_eq!(parse_number("-$1,250.5"), Some(-1250.5));
        assert_eq!(parse_number("12 34"), None);
        assert_eq!(parse_number("$ 12"), None);
        assert_eq!(parse_number("--12"), None);
    }

    #[test]
    fn test_spaced_digits_are_not_numeric() {
        let sheet = Worksheet::from_cells("Summary", ReadMode::Computed, vec![text(3, 4, "12 34")]);
        let entries = rollup(&sheet, &[Anchor::at("PERMITS", "D3").unwrap()]);
        assert_eq!(entries[0].value, 0.0);
        assert!(entries[0].defaulted);
        assert_eq!(entries[0].issue, Some(SummaryIssue::NonNumeric("12 34".to_owned())));
    }
}
