//! # Spreadsheet Access
//!
//! Reads OOXML (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument (`.ods`) workbooks
//! into in-memory [`Worksheet`]s that keep both the formula text and the cached
//! result of every cell, so callers can pick a [`ReadMode`] per read.
pub mod cell;
mod excel;
pub(crate) mod formula;
mod ods;
pub mod reference;
pub mod sheet;
mod xlsx;

use crate::error::EstimateSheetError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use glob::Pattern;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while opening workbooks and locating sheets
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Workbook '{0}' is unavailable: {1}")]
    SourceUnavailable(String, String),

    #[error("Unsupported workbook format '{0}': {1}")]
    UnsupportedFormat(String, String),

    #[error("Workbook '{0}' is password protected")]
    PasswordProtected(String),

    #[error("Workbook '{0}' contains no sheets")]
    EmptyWorkbook(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetMissing(String, String),

    #[error("Invalid ODS MIME type")]
    MimeTypeError,

    #[error("Missing workbook part: '{0}'")]
    FileError(String),

    #[error("Invalid value '{3}' at {1}!{2} in '{0}'")]
    CellValueError(String, String, String, String),
}

/// A workbook format reader
pub(crate) trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Loads one sheet, `SheetMissing` when no sheet has this name
    fn read_sheet(&mut self, sheet_name: &str, mode: ReadMode) -> Result<Worksheet, EstimateSheetError>;
}

/// Opens a spreadsheet reader chosen by file extension
pub(crate) fn open_spreadsheet(file_name: &str, reader: UnifiedReader) -> Result<Box<dyn Spreadsheet>, EstimateSheetError> {
    let extension = Path::new(file_name.split(['?', '#']).next().unwrap_or(file_name))
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" | "xlam" => Ok(Box::new(XlsxSpreadsheet::open(file_name, reader)?)),
        "ods" => Ok(Box::new(OdsSpreadsheet::open(file_name, reader)?)),
        _ => Err(SpreadsheetError::UnsupportedFormat(
            file_name.to_owned(),
            format!("extension '{extension}' is not one of xlsx, xlsm, xlam, ods"),
        ))?,
    }
}

/// An opened workbook together with the mode its cells are read in
pub struct Workbook {
    spreadsheet: Box<dyn Spreadsheet>,
    mode: ReadMode,
}

impl Workbook {
    /// Opens a local path or remote URL.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` when the file cannot be read, `UnsupportedFormat`
    /// when it is not a readable xlsx/ods container.
    pub fn open(file_name: &str, mode: ReadMode) -> Result<Self, EstimateSheetError> {
        let reader = UnifiedReader::new(file_name)?;
        let spreadsheet = open_spreadsheet(file_name, reader)?;
        info!(file_name, ?mode, sheets = spreadsheet.sheet_names().len(), "opened workbook");
        Ok(Workbook { spreadsheet, mode })
    }

    /// Opens workbook content already held in memory; `file_name` only selects the format
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>, mode: ReadMode) -> Result<Self, EstimateSheetError> {
        let spreadsheet = open_spreadsheet(file_name, UnifiedReader::from_bytes(bytes))?;
        Ok(Workbook { spreadsheet, mode })
    }

    pub fn name(&self) -> String {
        self.spreadsheet.name()
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.spreadsheet.sheet_names()
    }

    /// Sheet names matching a glob pattern, all sheets when no pattern is given
    pub fn sheet_names_matching(&self, pattern: Option<&Pattern>) -> Vec<String> {
        self.sheet_names()
            .into_iter()
            .filter(|name| pattern.map(|pattern| pattern.matches(name)).unwrap_or(true))
            .collect()
    }

    /// Loads a sheet by name, or the first sheet when `name` is `None`
    pub fn sheet(&mut self, name: Option<&str>) -> Result<Worksheet, EstimateSheetError> {
        let name = match name {
            Some(name) => name.to_owned(),
            None => self.sheet_names()
                .into_iter()
                .next()
                .ok_or_else(|| SpreadsheetError::EmptyWorkbook(self.name()))?,
        };
        self.spreadsheet.read_sheet(&name, self.mode)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Builds a zip container from (part name, content) pairs
    pub(crate) fn archive(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_unsupported_extension() {
        let result = Workbook::from_bytes("estimate.csv", b"a,b".to_vec(), ReadMode::Raw);
        assert!(matches!(
            result.err().and_then(|error| match error {
                EstimateSheetError::SpreadsheetError(error) => Some(error),
                _ => None,
            }),
            Some(SpreadsheetError::UnsupportedFormat(..))
        ));
    }

    #[test]
    fn test_not_a_zip_container() {
        let result = Workbook::from_bytes("estimate.xlsx", b"not a zip".to_vec(), ReadMode::Raw);
        assert!(matches!(
            result,
            Err(EstimateSheetError::SpreadsheetError(SpreadsheetError::UnsupportedFormat(..)))
        ));
    }

    #[test]
    fn test_missing_source() {
        let result = Workbook::open("/no/such/dir/estimate.xlsx", ReadMode::Raw);
        assert!(matches!(
            result,
            Err(EstimateSheetError::SpreadsheetError(SpreadsheetError::SourceUnavailable(..)))
        ));
    }
}
