//! # Label Values Table Function
//!
//! `label_values(path, ...)` lists every text label with the non-empty cell
//! next to it, in row-major order.
use crate::error::EstimateSheetError;
use crate::extension::writer::add_result_columns;
use crate::extension::writer::write_chunk;
use crate::extension::writer::ColumnType;
use crate::extension::writer::Field;
use crate::extension::writer::RecordsBindData;
use crate::extension::writer::RecordsInitData;
use crate::extension::ColOffsetParam;
use crate::extension::NamedParam;
use crate::extension::RowOffsetParam;
use crate::extension::SheetParameters;
use crate::extraction::config::Offset;
use crate::extraction::config::PairingRules;
use crate::extraction::label_value::pair_labels;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("sheet_name", ColumnType::Varchar),
    ("label", ColumnType::Varchar),
    ("label_cell", ColumnType::Varchar),
    ("value_cell", ColumnType::Varchar),
    ("value", ColumnType::Varchar),
    ("value_number", ColumnType::Double),
    ("is_formula", ColumnType::Boolean),
];

struct LabelValuesParameters {
    sheet: SheetParameters,
    row_offset: Option<i32>,
    col_offset: Option<i32>,
}

impl TryFrom<&BindInfo> for LabelValuesParameters {
    type Error = EstimateSheetError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(LabelValuesParameters {
            sheet: SheetParameters::try_from(bind)?,
            row_offset: RowOffsetParam::read(bind)?,
            col_offset: ColOffsetParam::read(bind)?,
        })
    }
}

impl TryFrom<&LabelValuesParameters> for RecordsBindData {
    type Error = EstimateSheetError;

    fn try_from(parameters: &LabelValuesParameters) -> Result<Self, Self::Error> {
        let sheet = parameters.sheet.load_sheet()?;
        let defaults = PairingRules::default();
        let rules = PairingRules {
            bounds: parameters.sheet.range.unwrap_or(defaults.bounds),
            offset: Offset {
                delta_row: parameters.row_offset.unwrap_or(defaults.offset.delta_row),
                delta_col: parameters.col_offset.unwrap_or(defaults.offset.delta_col),
            },
        };
        let records = pair_labels(&sheet, &rules)
            .into_iter()
            .map(|record| vec![
                Field::varchar(sheet.name.as_str()),
                Field::varchar(record.label),
                Field::varchar(record.label_coord.reference()),
                Field::varchar(record.value_coord.reference()),
                Field::value(&record.value),
                Field::number(&record.value),
                Field::Boolean(record.value.is_formula()),
            ])
            .collect();
        Ok(RecordsBindData { records })
    }
}

pub(crate) struct LabelValuesTableFunction;

impl VTab for LabelValuesTableFunction {
    type InitData = RecordsInitData;
    type BindData = RecordsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = LabelValuesParameters::try_from(bind)?;
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
        parameters.push(RowOffsetParam::definition());
        parameters.push(ColOffsetParam::definition());
        Some(parameters)
    }
}
