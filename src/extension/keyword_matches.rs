//! # Keyword Matches Table Function
//!
//! `keyword_matches(path, ...)` scans one or more sheets for cost keywords and
//! returns each matching label with the cell next to it.
use crate::error::EstimateSheetError;
use crate::error::ResultMessage;
use crate::extension::writer::add_result_columns;
use crate::extension::writer::write_chunk;
use crate::extension::writer::ColumnType;
use crate::extension::writer::Field;
use crate::extension::writer::RecordsBindData;
use crate::extension::writer::RecordsInitData;
use crate::extension::ExtensionError;
use crate::extension::KeywordsParam;
use crate::extension::NamedParam;
use crate::extension::SheetParameters;
use crate::extension::SheetsParam;
use crate::extraction::config::KeywordRules;
use crate::extraction::config::KeywordSet;
use crate::extraction::keyword::scan_keywords;
use crate::spreadsheet::reference::Coordinate;
use crate::spreadsheet::Workbook;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use glob::Pattern;
use std::error::Error;
use tracing::debug;

const COLUMNS: &[(&str, ColumnType)] = &[
    ("sheet_name", ColumnType::Varchar),
    ("keyword", ColumnType::Varchar),
    ("label_cell", ColumnType::Varchar),
    ("label", ColumnType::Varchar),
    ("value_cell", ColumnType::Varchar),
    ("value", ColumnType::Varchar),
    ("value_number", ColumnType::Double),
    ("is_formula", ColumnType::Boolean),
];

struct KeywordMatchesParameters {
    sheet: SheetParameters,
    sheets: Option<Pattern>,
    keywords: Option<KeywordSet>,
}

impl TryFrom<&BindInfo> for KeywordMatchesParameters {
    type Error = EstimateSheetError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(KeywordMatchesParameters {
            sheet: SheetParameters::try_from(bind)?,
            sheets: SheetsParam::read(bind)?,
            keywords: KeywordsParam::read(bind)?,
        })
    }
}

impl KeywordMatchesParameters {
    /// Sheets to scan: the named sheet, else every sheet matching the glob, else all sheets
    fn sheet_names(&self, workbook: &Workbook) -> Result<Vec<String>, EstimateSheetError> {
        if let Some(sheet) = &self.sheet.sheet {
            return Ok(vec![sheet.to_owned()]);
        }
        let names = workbook.sheet_names_matching(self.sheets.as_ref());
        match &self.sheets {
            Some(pattern) if names.is_empty() => {
                Err(ExtensionError::SheetWildcardError(workbook.name(), pattern.to_string()))?
            }
            _ => Ok(names),
        }
    }
}

impl TryFrom<&KeywordMatchesParameters> for RecordsBindData {
    type Error = EstimateSheetError;

    fn try_from(parameters: &KeywordMatchesParameters) -> Result<Self, Self::Error> {
        let mut workbook = Workbook::open(&parameters.sheet.path, parameters.sheet.mode)?;
        let defaults = KeywordRules::default();
        let rules = KeywordRules {
            bounds: parameters.sheet.range.unwrap_or(defaults.bounds),
            keywords: parameters.keywords.to_owned().unwrap_or(defaults.keywords),
            ..defaults
        };

        let mut records = Vec::new();
        for name in parameters.sheet_names(&workbook)? {
            let sheet = workbook.sheet(Some(name.as_str())).with_prefix(&workbook.name())?;
            let scan = scan_keywords(&sheet, &rules);
            debug!(sheet = %name, matches = scan.matches().len(), "keyword scan");
            records.extend(scan.matches().iter().map(|found| vec![
                Field::varchar(sheet.name.as_str()),
                Field::varchar(found.keyword.as_str()),
                Field::varchar(found.label_coord.reference()),
                Field::varchar(found.label_text.as_str()),
                Field::optional_varchar(found.value_coord.as_ref().map(Coordinate::reference)),
                Field::value(&found.value),
                Field::number(&found.value),
                Field::Boolean(found.value.is_formula()),
            ]));
        }
        Ok(RecordsBindData { records })
    }
}

pub(crate) struct KeywordMatchesTableFunction;

impl VTab for KeywordMatchesTableFunction {
    type InitData = RecordsInitData;
    type BindData = RecordsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = KeywordMatchesParameters::try_from(bind)?;
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
        parameters.push(SheetsParam::definition());
        parameters.push(KeywordsParam::definition());
        Some(parameters)
    }
}
