use crate::error::EstimateSheetError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::formula::translate_odf_formula;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use tracing::debug;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const SPREADSHEET: QName = QName(b"office:spreadsheet");
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cell hidden under a merged range
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// Comments attached to a cell
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces
const STRING: QName = QName(b"text:s");

/// Repeated blank rows and columns pad sheets to the full grid; content never repeats this far
const REPEAT_LIMIT: u32 = 10_000;

/// An OpenDocument spreadsheet (.ods)
pub(crate) struct OdsSpreadsheet {
    name: String,
    zip: ZipArchive<UnifiedReader>,
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<Self, EstimateSheetError> {
        let mut zip = ZipArchive::new(reader)
            .map_err(|error| SpreadsheetError::UnsupportedFormat(file_name.to_owned(), error.to_string()))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected(file_name.to_owned()))?;
        }
        let sheets = load_sheet_names(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook(file_name.to_owned()))?;
        }
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
            sheets,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    /// Reads one `table:table` from content.xml.
    ///
    /// `table:formula` holds the formula; the `office:*value` attributes hold the
    /// result cached at save time. A formula cell without a value type is stale.
    fn read_sheet(&mut self, sheet_name: &str, mode: ReadMode) -> Result<Worksheet, EstimateSheetError> {
        if !self.sheets.iter().any(|name| name == sheet_name) {
            Err(SpreadsheetError::SheetMissing(self.name.to_owned(), sheet_name.to_owned()))?;
        }
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;

        let mut found = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                if event.get_attribute_value("table:name")?.map(|name| name == sheet_name).unwrap_or(false) {
                    found = true;
                    break;
                }
            }
        });
        if !found {
            Err(SpreadsheetError::SheetMissing(self.name.to_owned(), sheet_name.to_owned()))?;
        }

        let mut sheet = Worksheet::from_cells(sheet_name, mode, Vec::new());
        let mut row = 1u32;
        let mut col = 1u32;
        let mut row_count = 1u32;
        let mut col_count = 1u32;
        let mut kind = None::<CellType>;
        let mut value = String::new();
        let mut formula = None::<String>;
        let mut element_context = false; // collecting paragraph text
        let mut comment_context = false; // inside an annotation
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 1;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count);
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attribute_value::<u32>("table:number-columns-repeated")?.unwrap_or(1);
                formula = event.get_attribute_value("table:formula")?.map(|text| translate_odf_formula(&text));
                kind = match event.get_attribute_value("office:value-type")? {
                    Some(value_type) => Some(match value_type.as_ref() {
                        "boolean" => CellType::Boolean,
                        "date" => CellType::IsoDateTime,
                        "time" => CellType::IsoDuration,
                        "string" => {
                            let is_error = event.get_attribute_value("calcext:value-type")?
                                .map(|value_type| value_type == "error")
                                .unwrap_or(false);
                            if is_error { CellType::Error } else { CellType::InlineString }
                        }
                        _ => CellType::Number,
                    }),
                    None => None,
                };
                match kind {
                    Some(CellType::InlineString) | Some(CellType::Error) => {
                        // string-value holds the result when there is no paragraph text
                        if let Some(data) = event.get_attribute_value("office:string-value")? {
                            value.push_str(&data);
                        } else {
                            element_context = true;
                        }
                    }
                    Some(CellType::Boolean) => {
                        let truth = event.get_attribute_value("office:boolean-value")?
                            .map(|data| data != "false" && data != "0")
                            .unwrap_or(false);
                        value.push_str(if truth { "1" } else { "0" });
                    }
                    Some(CellType::IsoDateTime) => if let Some(data) = event.get_attribute_value("office:date-value")? {
                        value.push_str(&data);
                    },
                    Some(CellType::IsoDuration) => if let Some(data) = event.get_attribute_value("office:time-value")? {
                        value.push_str(&data);
                    },
                    Some(_) => if let Some(data) = event.get_attribute_value("office:value")? {
                        value.push_str(&data);
                    },
                    None => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                let cached = match kind {
                    Some(CellType::InlineString) if value.is_empty() && formula.is_none() => None,
                    Some(cell_type) => Some(cell_type.to_scalar(&value, &[]).map_err(|_| {
                        SpreadsheetError::CellValueError(
                            self.name.to_owned(),
                            sheet_name.to_owned(),
                            index_to_reference(row, col),
                            value.to_owned(),
                        )
                    })?),
                    None => None,
                };
                if cached.is_some() || formula.is_some() {
                    for row_offset in 0..row_count.min(REPEAT_LIMIT) {
                        for col_offset in 0..col_count.min(REPEAT_LIMIT) {
                            sheet.push(Cell {
                                row: row + row_offset,
                                col: col + col_offset,
                                formula: formula.to_owned(),
                                cached: cached.to_owned(),
                            });
                        }
                    }
                }
                col = col.saturating_add(col_count);
                kind = None;
                formula = None;
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });
        sheet.finish();
        debug!(sheet = sheet_name, rows = sheet.used_rows(), cols = sheet.used_cols(), "read ods sheet");
        Ok(sheet)
    }
}

/// Lists `table:table` names from content.xml in document order
fn load_sheet_names(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, EstimateSheetError> {
    let mut reader = zip
        .xml_reader("content.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("content.xml".to_owned()))?;
    let mut names = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            if let Some(name) = event.get_attribute_value("table:name")? {
                names.push(name.into_owned());
            }
        }
    });
    Ok(names)
}

/// Validates the `mimetype` entry when the archive carries one
fn check_mime(zip: &mut ZipArchive<UnifiedReader>) -> Result<(), EstimateSheetError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(SpreadsheetError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks the manifest for encrypted entries
fn is_password_protected(zip: &mut ZipArchive<UnifiedReader>) -> Result<bool, EstimateSheetError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
