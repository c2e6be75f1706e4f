//! # Extension Core Module
//!
//! Named parameter handling and workbook loading shared by the table functions.
use crate::bridge::ValueBridge;
use crate::error::EstimateSheetError;
use crate::extraction::config::parse_column;
use crate::extraction::config::Anchor;
use crate::extraction::config::KeywordSet;
use crate::extraction::config::ScanBounds;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::Workbook;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use glob::Pattern;
use thiserror::Error;

pub(crate) mod formula_cells;
pub(crate) mod keyword_matches;
pub(crate) mod label_values;
pub(crate) mod line_items;
pub(crate) mod summary_totals;
mod writer;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(String, String),

    #[error("No sheet in '{0}' matches '{1}'")]
    SheetWildcardError(String, String),
}

/// A positional parameter
pub(crate) trait Param<T> {
    fn read(bind: &BindInfo, index: u64) -> Result<T, EstimateSheetError>;
}

/// A named parameter of a table function.
pub(crate) trait NamedParam<T> {
    /// Parameter name as used in SQL
    fn name() -> &'static str;

    /// DuckDB logical type of the parameter
    fn kind() -> LogicalTypeHandle;

    /// Name and type, as registered with DuckDB
    fn definition() -> (String, LogicalTypeHandle) {
        (Self::name().to_string(), Self::kind())
    }

    /// Reads and validates the parameter, `None` when it was not given
    fn read(bind: &BindInfo) -> Result<Option<T>, EstimateSheetError>;

    fn invalid(message: String) -> EstimateSheetError {
        ExtensionError::InvalidParameter(Self::name().to_owned(), message).into()
    }
}

fn varchar() -> LogicalTypeHandle {
    LogicalTypeHandle::from(LogicalTypeId::Varchar)
}

fn integer() -> LogicalTypeHandle {
    LogicalTypeHandle::from(LogicalTypeId::Integer)
}

fn varchar_list() -> LogicalTypeHandle {
    LogicalTypeHandle::list(&varchar())
}

/// Reads a VARCHAR[] parameter as a keyword set
fn read_keywords(bind: &BindInfo, name: &str) -> Option<KeywordSet> {
    let value = bind.get_named_parameter(name)?;
    Some(KeywordSet::new(value.to_list().iter().map(|keyword| keyword.to_varchar())))
}

/// Workbook path or URL
pub(crate) struct PathParam;

impl Param<String> for PathParam {
    fn read(bind: &BindInfo, index: u64) -> Result<String, EstimateSheetError> {
        let path = bind.get_parameter(index).to_varchar();
        if path.trim().is_empty() {
            Err(ExtensionError::InvalidParameter("path".to_owned(), "path is empty".to_owned()))?
        }
        Ok(path)
    }
}

pub(crate) struct SheetParam;

impl NamedParam<String> for SheetParam {
    fn name() -> &'static str {
        "sheet"
    }

    fn kind() -> LogicalTypeHandle {
        varchar()
    }

    fn read(bind: &BindInfo) -> Result<Option<String>, EstimateSheetError> {
        Ok(bind.get_named_parameter(Self::name()).map(|value| value.to_varchar()))
    }
}

/// Glob over sheet names, e.g. `'Cost*'`
pub(crate) struct SheetsParam;

impl NamedParam<Pattern> for SheetsParam {
    fn name() -> &'static str {
        "sheets"
    }

    fn kind() -> LogicalTypeHandle {
        varchar()
    }

    fn read(bind: &BindInfo) -> Result<Option<Pattern>, EstimateSheetError> {
        match bind.get_named_parameter(Self::name()) {
            Some(value) => Ok(Some(Pattern::new(&value.to_varchar())?)),
            None => Ok(None),
        }
    }
}

/// Scan bounds as an A1 range
pub(crate) struct RangeParam;

impl NamedParam<ScanBounds> for RangeParam {
    fn name() -> &'static str {
        "range"
    }

    fn kind() -> LogicalTypeHandle {
        varchar()
    }

    fn read(bind: &BindInfo) -> Result<Option<ScanBounds>, EstimateSheetError> {
        match bind.get_named_parameter(Self::name()) {
            Some(value) => Ok(Some(ScanBounds::try_from(value.to_varchar().as_str())?)),
            None => Ok(None),
        }
    }
}

/// `'raw'` or `'computed'`
pub(crate) struct ModeParam;

impl NamedParam<ReadMode> for ModeParam {
    fn name() -> &'static str {
        "mode"
    }

    fn kind() -> LogicalTypeHandle {
        varchar()
    }

    fn read(bind: &BindInfo) -> Result<Option<ReadMode>, EstimateSheetError> {
        match bind.get_named_parameter(Self::name()) {
            Some(value) => Ok(Some(ReadMode::parse(&value.to_varchar())?)),
            None => Ok(None),
        }
    }
}

/// Declares an INTEGER named parameter holding a signed offset
macro_rules! offset_param {
    ($param:ident, $name:literal) => {
        pub(crate) struct $param;

        impl NamedParam<i32> for $param {
            fn name() -> &'static str {
                $name
            }

            fn kind() -> LogicalTypeHandle {
                integer()
            }

            fn read(bind: &BindInfo) -> Result<Option<i32>, EstimateSheetError> {
                Ok(bind.get_named_parameter(Self::name()).map(|value| value.to_int32()))
            }
        }
    };
}

offset_param!(RowOffsetParam, "row_offset");
offset_param!(ColOffsetParam, "col_offset");
offset_param!(DescriptionColParam, "description_col");
offset_param!(QuantityColParam, "quantity_col");
offset_param!(UnitPriceColParam, "unit_price_col");
offset_param!(TotalColParam, "total_col");

/// Declares a VARCHAR named parameter holding a column (`'D'` or `'4'`)
macro_rules! column_param {
    ($param:ident, $name:literal) => {
        pub(crate) struct $param;

        impl NamedParam<u32> for $param {
            fn name() -> &'static str {
                $name
            }

            fn kind() -> LogicalTypeHandle {
                varchar()
            }

            fn read(bind: &BindInfo) -> Result<Option<u32>, EstimateSheetError> {
                match bind.get_named_parameter(Self::name()) {
                    Some(value) => Ok(Some(parse_column(&value.to_varchar())?)),
                    None => Ok(None),
                }
            }
        }
    };
}

column_param!(ColumnParam, "column");
column_param!(ValueColumnParam, "value_column");

/// Declares a VARCHAR[] named parameter holding keywords
macro_rules! keywords_param {
    ($param:ident, $name:literal) => {
        pub(crate) struct $param;

        impl NamedParam<KeywordSet> for $param {
            fn name() -> &'static str {
                $name
            }

            fn kind() -> LogicalTypeHandle {
                varchar_list()
            }

            fn read(bind: &BindInfo) -> Result<Option<KeywordSet>, EstimateSheetError> {
                match read_keywords(bind, Self::name()) {
                    Some(keywords) if keywords.is_empty() => Err(Self::invalid("keyword list is empty".to_owned())),
                    keywords => Ok(keywords),
                }
            }
        }
    };
}

keywords_param!(HeaderKeywordsParam, "header_keywords");
keywords_param!(TotalKeywordsParam, "total_keywords");
keywords_param!(KeywordsParam, "keywords");

/// Named summary cells, `MAP {'EXCAVATION': 'D5'}`
pub(crate) struct AnchorsParam;

impl NamedParam<Vec<Anchor>> for AnchorsParam {
    fn name() -> &'static str {
        "anchors"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::map(&varchar(), &varchar())
    }

    fn read(bind: &BindInfo) -> Result<Option<Vec<Anchor>>, EstimateSheetError> {
        let Some(value) = bind.get_named_parameter(Self::name()) else {
            return Ok(None);
        };
        let anchors = value
            .to_map_entries()
            .iter()
            .map(|(name, reference)| Ok(Anchor::at(&name.to_varchar(), &reference.to_varchar())?))
            .collect::<Result<Vec<_>, EstimateSheetError>>()?;
        Ok(Some(anchors))
    }
}

/// Parameters every table function accepts
pub(crate) struct SheetParameters {
    pub(crate) path: String,
    pub(crate) sheet: Option<String>,
    pub(crate) range: Option<ScanBounds>,
    pub(crate) mode: ReadMode,
}

impl TryFrom<&BindInfo> for SheetParameters {
    type Error = EstimateSheetError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(SheetParameters {
            path: PathParam::read(bind, 0)?,
            sheet: SheetParam::read(bind)?,
            range: RangeParam::read(bind)?,
            mode: ModeParam::read(bind)?.unwrap_or_default(),
        })
    }
}

impl SheetParameters {
    /// Definitions of the shared named parameters
    pub(crate) fn definitions() -> Vec<(String, LogicalTypeHandle)> {
        vec![
            SheetParam::definition(),
            RangeParam::definition(),
            ModeParam::definition(),
        ]
    }

    /// Opens the workbook and loads the selected sheet
    pub(crate) fn load_sheet(&self) -> Result<Worksheet, EstimateSheetError> {
        let mut workbook = Workbook::open(&self.path, self.mode)?;
        workbook.sheet(self.sheet.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let error = EstimateSheetError::from(ExtensionError::InvalidParameter(
            "keywords".to_owned(),
            "keyword list is empty".to_owned(),
        ));
        assert_eq!(error.to_string(), "Invalid parameter 'keywords': keyword list is empty");
    }
}
