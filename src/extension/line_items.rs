//! # Line Items Table Function
//!
//! `line_items(path, ...)` cuts the sheet into cost sections and returns one
//! row per section header, line item and total row, in sheet order.
use crate::error::EstimateSheetError;
use crate::extension::writer::add_result_columns;
use crate::extension::writer::write_chunk;
use crate::extension::writer::ColumnType;
use crate::extension::writer::Field;
use crate::extension::writer::RecordsBindData;
use crate::extension::writer::RecordsInitData;
use crate::extension::ColumnParam;
use crate::extension::DescriptionColParam;
use crate::extension::HeaderKeywordsParam;
use crate::extension::NamedParam;
use crate::extension::QuantityColParam;
use crate::extension::SheetParameters;
use crate::extension::TotalColParam;
use crate::extension::TotalKeywordsParam;
use crate::extension::UnitPriceColParam;
use crate::extraction::config::KeywordSet;
use crate::extraction::config::LineItemColumns;
use crate::extraction::config::SectionRules;
use crate::extraction::line_item::extract_line_items;
use crate::extraction::line_item::LineItem;
use crate::extraction::line_item::Section;
use crate::extraction::section::segment;
use crate::spreadsheet::cell::CellValue;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("section", ColumnType::Varchar),
    ("header_cell", ColumnType::Varchar),
    ("row_kind", ColumnType::Varchar),
    ("cell", ColumnType::Varchar),
    ("description", ColumnType::Varchar),
    ("quantity", ColumnType::Double),
    ("quantity_formula", ColumnType::Varchar),
    ("unit_price", ColumnType::Double),
    ("unit_price_formula", ColumnType::Varchar),
    ("total", ColumnType::Double),
    ("total_formula", ColumnType::Varchar),
];

struct LineItemsParameters {
    sheet: SheetParameters,
    column: Option<u32>,
    header_keywords: Option<KeywordSet>,
    total_keywords: Option<KeywordSet>,
    description_col: Option<i32>,
    quantity_col: Option<i32>,
    unit_price_col: Option<i32>,
    total_col: Option<i32>,
}

impl TryFrom<&BindInfo> for LineItemsParameters {
    type Error = EstimateSheetError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(LineItemsParameters {
            sheet: SheetParameters::try_from(bind)?,
            column: ColumnParam::read(bind)?,
            header_keywords: HeaderKeywordsParam::read(bind)?,
            total_keywords: TotalKeywordsParam::read(bind)?,
            description_col: DescriptionColParam::read(bind)?,
            quantity_col: QuantityColParam::read(bind)?,
            unit_price_col: UnitPriceColParam::read(bind)?,
            total_col: TotalColParam::read(bind)?,
        })
    }
}

impl LineItemsParameters {
    /// Overrides the default rules with the given parameters.
    /// A range limits the scanned rows; its first column is the section column
    /// unless `column` is given.
    fn rules(&self) -> SectionRules {
        let defaults = SectionRules::default();
        let range = self.sheet.range;
        let columns = LineItemColumns {
            description: self.description_col.unwrap_or(defaults.columns.description),
            quantity: self.quantity_col.unwrap_or(defaults.columns.quantity),
            unit_price: self.unit_price_col.unwrap_or(defaults.columns.unit_price),
            total: self.total_col.unwrap_or(defaults.columns.total),
            extra: Vec::new(),
        };
        SectionRules {
            column: self.column
                .or(range.map(|range| range.first_col))
                .unwrap_or(defaults.column),
            first_row: range.map(|range| range.first_row).unwrap_or(defaults.first_row),
            last_row: range.map(|range| range.last_row).unwrap_or(defaults.last_row),
            header_keywords: self.header_keywords.to_owned().unwrap_or(defaults.header_keywords),
            total_keywords: self.total_keywords.to_owned().unwrap_or(defaults.total_keywords),
            columns,
        }
    }
}

/// Number and formula fields of an optional line item value
fn value_fields(value: &Option<CellValue>) -> [Field; 2] {
    match value {
        Some(value) => [Field::number(value), Field::formula(value)],
        None => [Field::Null, Field::Null],
    }
}

fn item_record(section: &Section, kind: &str, item: &LineItem) -> Vec<Field> {
    let mut record = vec![
        Field::varchar(section.name.as_str()),
        Field::varchar(section.header_coord.reference()),
        Field::varchar(kind),
        Field::varchar(item.row.reference()),
        Field::varchar(item.description.as_str()),
    ];
    record.extend(value_fields(&item.quantity));
    record.extend(value_fields(&item.unit_price));
    record.extend(value_fields(&item.total));
    record
}

fn section_records(section: &Section) -> Vec<Vec<Field>> {
    let mut header = vec![
        Field::varchar(section.name.as_str()),
        Field::varchar(section.header_coord.reference()),
        Field::varchar("header"),
        Field::varchar(section.header_coord.reference()),
        Field::varchar(section.name.as_str()),
    ];
    header.resize(COLUMNS.len(), Field::Null);

    // Items and totals interleave by row
    let mut rows: Vec<(&str, &LineItem)> = section.items
        .iter()
        .map(|item| ("item", item))
        .chain(section.totals.iter().map(|item| ("total", item)))
        .collect();
    rows.sort_by_key(|(_, item)| item.row.row);

    std::iter::once(header)
        .chain(rows.into_iter().map(|(kind, item)| item_record(section, kind, item)))
        .collect()
}

impl TryFrom<&LineItemsParameters> for RecordsBindData {
    type Error = EstimateSheetError;

    fn try_from(parameters: &LineItemsParameters) -> Result<Self, Self::Error> {
        let sheet = parameters.sheet.load_sheet()?;
        let rules = parameters.rules();
        let records = segment(&sheet, &rules)
            .iter()
            .map(|section| extract_line_items(&sheet, section, &rules))
            .flat_map(|section| section_records(&section))
            .collect();
        Ok(RecordsBindData { records })
    }
}

pub(crate) struct LineItemsTableFunction;

impl VTab for LineItemsTableFunction {
    type InitData = RecordsInitData;
    type BindData = RecordsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = LineItemsParameters::try_from(bind)?;
        let data = RecordsBindData::try_from(&parameters)?;
        add_result_columns(bind, COLUMNS);
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(RecordsInitData::new())
    }

    fn func(func: &TableFunctionInfo<Self>, output: &mut DataChunkHandle) -> Result<(), Box<dyn Error>> {
        write_chunk(func.get_bind_data(), func.get_init_data(), output);
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        let mut parameters = SheetParameters::definitions();
        parameters.extend([
            ColumnParam::definition(),
            HeaderKeywordsParam::definition(),
            TotalKeywordsParam::definition(),
            DescriptionColParam::definition(),
            QuantityColParam::definition(),
            UnitPriceColParam::definition(),
            TotalColParam::definition(),
        ]);
        Some(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::Scalar;
    use crate::spreadsheet::reference::Coordinate;

    fn item(row: u32, description: &str, total: f64) -> LineItem {
        LineItem {
            row: Coordinate::new("Estimate", row, 1),
            description: description.to_owned(),
            quantity: None,
            unit_price: None,
            total: Some(CellValue::Literal(Scalar::Number(total))),
        }
    }

    #[test]
    fn test_section_records() {
        let section = Section {
            name: "EXCAVATION".to_owned(),
            header_coord: Coordinate::new("Estimate", 2, 1),
            items: vec![item(3, "Dig", 500.0), item(5, "Haul", 250.0)],
            totals: vec![item(4, "EXCAVATION SUBTOTAL", 500.0)],
        };
        let records = section_records(&section);
        let kinds: Vec<_> = records.iter().map(|record| record[2].to_owned()).collect();
        assert_eq!(kinds, vec![
            Field::varchar("header"),
            Field::varchar("item"),
            Field::varchar("total"),
            Field::varchar("item"),
        ]);
        assert!(records.iter().all(|record| record.len() == COLUMNS.len()));
        assert_eq!(records[1][9], Field::Double(500.0));
        assert_eq!(records[1][10], Field::Null);
        assert_eq!(records[0][5], Field::Null);
    }
}
