//! Line item interpretation of section rows.
//!
//! Values are assigned by how many value cells a row carries, never by what
//! they contain:
//!
//! | value cells | quantity | unit price | total |
//! |-------------|----------|------------|-------|
//! | 0           | -        | -          | -     |
//! | 1           | -        | -          | 1st   |
//! | 2           | 1st      | -          | 2nd   |
//! | 3 or more   | 1st      | 2nd        | 3rd   |
//!
//! A row with only a quantity and a unit price therefore reads as quantity
//! and total, as does a row with a unit price and a total. The layout does not
//! carry enough information to tell these apart.

use crate::extraction::config::SectionRules;
use crate::extraction::section::RawSection;
use crate::extraction::section::RowKind;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::sheet::Worksheet;
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct LineItem {
    /// Description cell of the row
    pub row: Coordinate,
    pub description: String,
    pub quantity: Option<CellValue>,
    pub unit_price: Option<CellValue>,
    pub total: Option<CellValue>,
}

/// A section with its rows interpreted
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub name: String,
    pub header_coord: Coordinate,
    pub items: Vec<LineItem>,
    /// Total rows closing the section, in row order
    pub totals: Vec<LineItem>,
}

/// Whether a cell counts towards the value columns of a row.
///
/// Non-zero numbers count. In a raw read a formula counts as well, since its
/// result is not known.
fn is_value(value: &CellValue) -> bool {
    match value {
        CellValue::Literal(scalar) => scalar.as_number().map(|number| number != 0.0).unwrap_or(false),
        CellValue::Formula(_) => true,
        CellValue::Empty => false,
    }
}

/// Interprets one row, `None` for blank separator rows
fn read_line_item(sheet: &Worksheet, row: u32, rules: &SectionRules) -> Option<LineItem> {
    let anchor = sheet.coordinate(row, rules.column);
    let description_coord = anchor.offset(0, rules.columns.description)?;
    let description = sheet
        .cell(description_coord.row, description_coord.col)
        .display()
        .map(|text| text.trim().to_owned())
        .unwrap_or_default();

    let mut values = rules
        .columns
        .value_offsets()
        .into_iter()
        .filter_map(|offset| anchor.offset(0, offset))
        .map(|coord| sheet.cell(coord.row, coord.col))
        .filter(is_value);
    let (quantity, unit_price, total) = match (values.next(), values.next(), values.next()) {
        (None, ..) => (None, None, None),
        (Some(total), None, _) => (None, None, Some(total)),
        (Some(quantity), Some(total), None) => (Some(quantity), None, Some(total)),
        (Some(quantity), Some(unit_price), Some(total)) => (Some(quantity), Some(unit_price), Some(total)),
    };

    if description.is_empty() && total.is_none() {
        return None;
    }
    Some(LineItem {
        row: description_coord,
        description,
        quantity,
        unit_price,
        total,
    })
}

/// Interprets the rows of a segmented section
pub fn extract_line_items(sheet: &Worksheet, section: &RawSection, rules: &SectionRules) -> Section {
    let mut items = Vec::new();
    let mut totals = Vec::new();
    let mut blank = 0usize;
    for row in &section.rows {
        match (read_line_item(sheet, row.row, rules), row.kind) {
            (Some(item), RowKind::Total) => totals.push(item),
            (Some(item), _) => items.push(item),
            (None, _) => blank += 1,
        }
    }
    debug!(section = %section.name, items = items.len(), totals = totals.len(), blank, "extracted line items");

    Section {
        name: section.name.to_owned(),
        header_coord: section.header_coord.to_owned(),
        items,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::config::LineItemColumns;
    use crate::extraction::section::segment;
    use crate::spreadsheet::cell::Cell;
    use crate::spreadsheet::cell::ReadMode;
    use crate::spreadsheet::cell::Scalar;

    fn text(row: u32, col: u32, text: &str) -> Cell {
        Cell::literal(row, col, Scalar::Text(text.to_owned()))
    }

    fn number(row: u32, col: u32, number: f64) -> Cell {
        Cell::literal(row, col, Scalar::Number(number))
    }

    fn literal(number: f64) -> Option<CellValue> {
        Some(CellValue::Literal(Scalar::Number(number)))
    }

    fn estimate(mode: ReadMode) -> Worksheet {
        Worksheet::from_cells("Estimate", mode, vec![
            text(1, 1, "EXCAVATION"),
            text(2, 1, "Dig and haul"),
            number(2, 2, 4.0),
            number(2, 3, 25.5),
            number(2, 4, 102.0),
            text(3, 1, "Haul fee"),
            number(3, 4, 500.0),
            text(4, 1, "Truck"),
            number(4, 2, 2.0),
            number(4, 3, 0.0),
            number(4, 4, 300.0),
            text(5, 1, "Site access"),
            text(6, 1, "Spoils"),
            number(6, 2, 3.0),
            number(6, 3, 10.0),
            Cell::formula(6, 4, "=B6*C6", Some(Scalar::Number(30.0))),
            number(6, 5, 99.0),
            text(8, 1, "EXCAVATION TOTAL"),
            Cell::formula(8, 4, "=SUM(D2:D6)", Some(Scalar::Number(932.0))),
        ])
    }

    fn sections(sheet: &Worksheet, rules: &SectionRules) -> Vec<Section> {
        segment(sheet, rules)
            .iter()
            .map(|section| extract_line_items(sheet, section, rules))
            .collect()
    }

    #[test]
    fn test_positional_values() {
        let sheet = estimate(ReadMode::Computed);
        let rules = SectionRules {
            columns: LineItemColumns {
                extra: vec![4],
                ..Default::default()
            },
            ..SectionRules::default()
        };
        let sections = sections(&sheet, &rules);
        assert_eq!(sections.len(), 1);
        let items = &sections[0].items;
        assert_eq!(items.len(), 5);

        assert_eq!(items[0].description, "Dig and haul");
        assert_eq!(items[0].row.reference(), "A2");
        assert_eq!((&items[0].quantity, &items[0].unit_price, &items[0].total), (&literal(4.0), &literal(25.5), &literal(102.0)));

        assert_eq!((&items[1].quantity, &items[1].unit_price, &items[1].total), (&None, &None, &literal(500.0)));

        // Zero is not a value, leaving two
        assert_eq!((&items[2].quantity, &items[2].unit_price, &items[2].total), (&literal(2.0), &None, &literal(300.0)));

        assert_eq!(items[3].description, "Site access");
        assert_eq!((&items[3].quantity, &items[3].unit_price, &items[3].total), (&None, &None, &None));

        // Extra values beyond the first three are ignored
        assert_eq!((&items[4].quantity, &items[4].unit_price, &items[4].total), (&literal(3.0), &literal(10.0), &literal(30.0)));
    }

    #[test]
    fn test_totals_and_blank_rows() {
        let sheet = estimate(ReadMode::Computed);
        let sections = sections(&sheet, &SectionRules::default());
        let section = &sections[0];
        assert!(section.items.iter().all(|item| item.row.row != 7));
        assert_eq!(section.totals.len(), 1);
        assert_eq!(section.totals[0].description, "EXCAVATION TOTAL");
        assert_eq!(section.totals[0].total, literal(932.0));
    }

    #[test]
    fn test_raw_formulas_are_values() {
        let sheet = estimate(ReadMode::Raw);
        let sections = sections(&sheet, &SectionRules::default());
        let spoils = &sections[0].items[4];
        assert_eq!(spoils.total, Some(CellValue::Formula("=B6*C6".to_owned())));
        assert_eq!(sections[0].totals[0].total, Some(CellValue::Formula("=SUM(D2:D6)".to_owned())));
    }

    #[test]
    fn test_row_without_description() {
        let sheet = Worksheet::from_cells("Estimate", ReadMode::Raw, vec![
            text(1, 1, "STEEL"),
            number(2, 4, 750.0),
            number(3, 2, 0.0),
        ]);
        let sections = sections(&sheet, &SectionRules::default());
        assert_eq!(sections[0].items.len(), 1);
        assert_eq!(sections[0].items[0].description, "");
        assert_eq!(sections[0].items[0].total, literal(750.0));
    }

    #[test]
    fn test_idempotent() {
        let sheet = estimate(ReadMode::Raw);
        let rules = SectionRules::default();
        assert_eq!(sections(&sheet, &rules), sections(&sheet, &rules));
    }
}
