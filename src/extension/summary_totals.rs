//! # Summary Totals Table Function
//!
//! `summary_totals(path, ...)` reads named total cells. Anchors come from the
//! `anchors` map, or are discovered from total labels when it is not given.
use crate::error::EstimateSheetError;
use crate::extension::writer::add_result_columns;
use crate::extension::writer::write_chunk;
use crate::extension::writer::ColumnType;
use crate::extension::writer::Field;
use crate::extension::writer::RecordsBindData;
use crate::extension::writer::RecordsInitData;
use crate::extension::AnchorsParam;
use crate::extension::ColumnParam;
use crate::extension::KeywordsParam;
use crate::extension::NamedParam;
use crate::extension::SheetParameters;
use crate::extension::ValueColumnParam;
use crate::extraction::config::Anchor;
use crate::extraction::config::AnchorDiscovery;
use crate::extraction::config::KeywordSet;
use crate::extraction::config::SummaryRules;
use crate::extraction::summary::summarize;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("name", ColumnType::Varchar),
    ("anchor_cell", ColumnType::Varchar),
    ("value", ColumnType::Double),
    ("defaulted", ColumnType::Boolean),
    ("issue", ColumnType::Varchar),
];

struct SummaryTotalsParameters {
    sheet: SheetParameters,
    anchors: Option<Vec<Anchor>>,
    column: Option<u32>,
    value_column: Option<u32>,
    keywords: Option<KeywordSet>,
}

impl TryFrom<&BindInfo> for SummaryTotalsParameters {
    type Error = EstimateSheetError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(SummaryTotalsParameters {
            sheet: SheetParameters::try_from(bind)?,
            anchors: AnchorsParam::read(bind)?,
            column: ColumnParam::read(bind)?,
            value_column: ValueColumnParam::read(bind)?,
            keywords: KeywordsParam::read(bind)?,
        })
    }
}

impl SummaryTotalsParameters {
    /// A range limits the rows searched for total labels
    fn rules(&self) -> SummaryRules {
        let defaults = AnchorDiscovery::default();
        let range = self.sheet.range;
        SummaryRules {
            anchors: self.anchors.to_owned().unwrap_or_default(),
            discovery: AnchorDiscovery {
                column: self.column.unwrap_or(defaults.column),
                first_row: range.map(|range| range.first_row).unwrap_or(defaults.first_row),
                last_row: range.map(|range| range.last_row).unwrap_or(defaults.last_row),
                keywords: self.keywords.to_owned().unwrap_or(defaults.keywords),
                value_col: self.value_column.unwrap_or(defaults.value_col),
            },
        }
    }
}

impl TryFrom<&SummaryTotalsParameters> for RecordsBindData {
    type Error = EstimateSheetError;

    fn try_from(parameters: &SummaryTotalsParameters) -> Result<Self, Self::Error> {
        let sheet = parameters.sheet.load_sheet()?;
        let records = summarize(&sheet, &parameters.rules())
            .into_iter()
            .map(|entry| vec![
                Field::varchar(entry.name),
                Field::varchar(entry.anchor.reference()),
                Field::Double(entry.value),
                Field::Boolean(entry.defaulted),
                Field::optional_varchar(entry.issue.map(|issue| issue.to_string())),
            ])
            .collect();
        Ok(RecordsBindData { records })
    }
}

pub(crate) struct SummaryTotalsTableFunction;

impl VTab for SummaryTotalsTableFunction {
    type InitData = RecordsInitData;
    type BindData = RecordsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SummaryTotalsParameters::try_from(bind)?;
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
            AnchorsParam::definition(),
            ColumnParam::definition(),
            ValueColumnParam::definition(),
            KeywordsParam::definition(),
        ]);
        Some(parameters)
    }
}
