//! # Formula Cells Table Function
//!
//! `formula_cells(path, ...)` lists every formula in range with the nearest
//! text label to its left and the result cached in the file.
use crate::error::EstimateSheetError;
use crate::extension::writer::add_result_columns;
use crate::extension::writer::write_chunk;
use crate::extension::writer::ColumnType;
use crate::extension::writer::Field;
use crate::extension::writer::RecordsBindData;
use crate::extension::writer::RecordsInitData;
use crate::extension::SheetParameters;
use crate::extraction::config::ScanBounds;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::sheet::Worksheet;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("cell", ColumnType::Varchar),
    ("label", ColumnType::Varchar),
    ("formula", ColumnType::Varchar),
    ("cached_value", ColumnType::Varchar),
];

/// Nearest non-empty text cell to the left on the same row
fn row_label(sheet: &Worksheet, row: u32, col: u32) -> Option<String> {
    (1..col).rev().find_map(|col| {
        sheet
            .stored(row, col)
            .and_then(|cell| cell.cached.as_ref())
            .and_then(|scalar| scalar.as_text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    })
}

fn formula_records(sheet: &Worksheet, bounds: &ScanBounds) -> Vec<Vec<Field>> {
    sheet
        .cells_in(bounds)
        .filter_map(|cell: &Cell| {
            let formula = cell.formula.as_ref()?;
            Some(vec![
                Field::varchar(sheet.coordinate(cell.row, cell.col).reference()),
                Field::optional_varchar(row_label(sheet, cell.row, cell.col)),
                Field::varchar(formula.as_str()),
                Field::scalar(cell.cached.as_ref()),
            ])
        })
        .collect()
}

impl TryFrom<&SheetParameters> for RecordsBindData {
    type Error = EstimateSheetError;

    fn try_from(parameters: &SheetParameters) -> Result<Self, Self::Error> {
        let sheet = parameters.load_sheet()?;
        let bounds = parameters.range.unwrap_or_else(ScanBounds::all);
        Ok(RecordsBindData {
            records: formula_records(&sheet, &bounds),
        })
    }
}

pub(crate) struct FormulaCellsTableFunction;

impl VTab for FormulaCellsTableFunction {
    type InitData = RecordsInitData;
    type BindData = RecordsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SheetParameters::try_from(bind)?;
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
        Some(SheetParameters::definitions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::ReadMode;
    use crate::spreadsheet::cell::Scalar;

    #[test]
    fn test_formula_records() {
        let sheet = Worksheet::from_cells("Estimate", ReadMode::Raw, vec![
            Cell::literal(2, 1, Scalar::Text("Rebar".to_owned())),
            Cell::literal(2, 2, Scalar::Number(12.0)),
            Cell::formula(2, 4, "=B2*C2", Some(Scalar::Number(96.0))),
            Cell::formula(3, 4, "=D2*2", None),
        ]);
        let records = formula_records(&sheet, &ScanBounds::all());
        assert_eq!(records, vec![
            vec![
                Field::varchar("D2"),
                Field::varchar("Rebar"),
                Field::varchar("=B2*C2"),
                Field::varchar("96"),
            ],
            vec![Field::varchar("D3"), Field::Null, Field::varchar("=D2*2"), Field::Null],
        ]);
        assert!(formula_records(&sheet, &ScanBounds::new(1, 1, 2, 3)).is_empty());
    }
}
