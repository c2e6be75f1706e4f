use crate::extraction::config::PairingRules;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use tracing::debug;

/// A text label and the non-empty cell next to it
#[derive(Clone, Debug, PartialEq)]
pub struct LabelValueRecord {
    /// Trimmed label text, never empty
    pub label: String,
    pub label_coord: Coordinate,
    pub value_coord: Coordinate,
    pub value: CellValue,
}

/// Pairs every text cell inside the rule bounds with the cell at the rule offset.
///
/// Records come back in row-major order. Labels whose value cell is empty or
/// falls off the sheet produce nothing; a label next to another label still
/// produces a record.
pub fn pair_labels(sheet: &Worksheet, rules: &PairingRules) -> Vec<LabelValueRecord> {
    let mut records = Vec::new();
    for cell in sheet.cells_in(&rules.bounds) {
        let label = match sheet.cell(cell.row, cell.col) {
            CellValue::Literal(scalar) => match scalar.as_text().map(str::trim) {
                Some(text) if !text.is_empty() => text.to_owned(),
                _ => continue,
            },
            _ => continue,
        };

        let label_coord = sheet.coordinate(cell.row, cell.col);
        let Some(value_coord) = label_coord.offset(rules.offset.delta_row, rules.offset.delta_col) else {
            continue;
        };
        let value = sheet.cell(value_coord.row, value_coord.col);
        if value.is_empty() {
            continue;
        }
        records.push(LabelValueRecord {
            label,
            label_coord,
            value_coord,
            value,
        });
    }
    debug!(sheet = %sheet.name, bounds = %rules.bounds, records = records.len(), "paired labels");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::config::Offset;
    use crate::extraction::config::ScanBounds;
    use crate::spreadsheet::cell::Cell;
    use crate::spreadsheet::cell::ReadMode;
    use crate::spreadsheet::cell::Scalar;

    fn text(row: u32, col: u32, text: &str) -> Cell {
        Cell::literal(row, col, Scalar::Text(text.to_owned()))
    }

    fn number(row: u32, col: u32, number: f64) -> Cell {
        Cell::literal(row, col, Scalar::Number(number))
    }

    fn inputs(mode: ReadMode) -> Worksheet {
        Worksheet::from_cells("Inputs", mode, vec![
            text(1, 1, "  Customer "),
            text(1, 2, "Smith"),
            text(2, 1, "Pool Size"),
            number(2, 2, 450.0),
            text(3, 1, "Depth"),
            text(4, 1, "   "),
            number(4, 2, 7.0),
            text(5, 1, "Perimeter"),
            Cell::formula(5, 2, "=B2/10", Some(Scalar::Number(45.0))),
            text(6, 3, "Outside"),
            number(6, 4, 1.0),
        ])
    }

    fn rules(bounds: &str) -> PairingRules {
        PairingRules {
            bounds: ScanBounds::try_from(bounds).unwrap(),
            offset: Offset::default(),
        }
    }

    #[test]
    fn test_pairs_in_row_major_order() {
        let records = pair_labels(&inputs(ReadMode::Raw), &rules("A1:B10"));
        let pairs: Vec<_> = records
            .iter()
            .map(|record| (record.label.as_str(), record.label_coord.reference(), record.value_coord.reference()))
            .collect();
        assert_eq!(pairs, vec![
            ("Customer", "A1".to_owned(), "B1".to_owned()),
            ("Pool Size", "A2".to_owned(), "B2".to_owned()),
            ("Perimeter", "A5".to_owned(), "B5".to_owned()),
        ]);
        assert_eq!(records[1].value, CellValue::Literal(Scalar::Number(450.0)));
        assert_eq!(records[2].value, CellValue::Formula("=B2/10".to_owned()));
    }

    #[test]
    fn test_label_next_to_label() {
        let sheet = Worksheet::from_cells("Inputs", ReadMode::Raw, vec![
            text(1, 1, "Finish"),
            text(1, 2, "Pebble"),
            text(1, 3, "Blue"),
        ]);
        let labels: Vec<_> = pair_labels(&sheet, &rules("A1:T100"))
            .into_iter()
            .map(|record| (record.label, record.value))
            .collect();
        assert_eq!(labels, vec![
            ("Finish".to_owned(), CellValue::Literal(Scalar::Text("Pebble".to_owned()))),
            ("Pebble".to_owned(), CellValue::Literal(Scalar::Text("Blue".to_owned()))),
        ]);
    }

    #[test]
    fn test_computed_mode_values() {
        let records = pair_labels(&inputs(ReadMode::Computed), &rules("A1:B10"));
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].value, CellValue::Literal(Scalar::Number(45.0)));
    }

    #[test]
    fn test_bounds_limit_labels_not_values() {
        let records = pair_labels(&inputs(ReadMode::Raw), &rules("C6"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_coord.reference(), "D6");
    }

    #[test]
    fn test_offset_below() {
        let sheet = Worksheet::from_cells("Inputs", ReadMode::Raw, vec![
            text(1, 1, "Total"),
            number(2, 1, 12.5),
            text(1, 2, "Ignored"),
        ]);
        let rules = PairingRules {
            bounds: ScanBounds::try_from("A1:B1").unwrap(),
            offset: Offset { delta_row: 1, delta_col: 0 },
        };
        let records = pair_labels(&sheet, &rules);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_coord.reference(), "A2");

        let rules = PairingRules {
            bounds: ScanBounds::try_from("A1").unwrap(),
            offset: Offset { delta_row: 0, delta_col: -1 },
        };
        assert!(pair_labels(&sheet, &rules).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let sheet = inputs(ReadMode::Raw);
        assert_eq!(pair_labels(&sheet, &rules("A1:T100")), pair_labels(&sheet, &rules("A1:T100")));
    }
}
