use crate::error::EstimateSheetError;
use crate::error::ResultMessage;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::formula::translate_shared_formula;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_FORMULA: QName = QName(b"f");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Anchor of a shared formula group: (row, col, formula text)
type SharedFormula = (u32, u32, String);

/// An OOXML workbook (.xlsx, .xlsm, .xlam)
pub(crate) struct XlsxSpreadsheet {
    name: String,
    zip: ZipArchive<UnifiedReader>,
    number_formats: Vec<CellType>,
    /// (sheet name, zip path) pairs in workbook order
    sheets: Vec<(String, String)>,
    /// Loaded on first sheet read
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<XlsxSpreadsheet, EstimateSheetError> {
        let package = excel::open(file_name, reader, load_workbook, load_number_formats)?;
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip: package.zip,
            number_formats: package.number_formats,
            sheets: package.sheets,
            shared_strings: None,
        })
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads every cell of one worksheet part.
    ///
    /// Each cell keeps its `<f>` formula text (shared formulas expanded for
    /// dependent cells) next to the `<v>` value cached by the last save.
    fn read_sheet(&mut self, sheet_name: &str, mode: ReadMode) -> Result<Worksheet, EstimateSheetError> {
        let zip_path = self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetMissing(self.name.to_owned(), sheet_name.to_owned()))?;

        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();

        let mut sheet = Worksheet::from_cells(sheet_name, mode, Vec::new());
        let mut shared_formulas = HashMap::<String, SharedFormula>::new();
        let mut row_count = 0u32;
        let mut col_count = 0u32;
        let mut row = 0u32;
        let mut col = 0u32;
        let mut kind = CellType::default();
        let mut value = None::<String>;
        let mut formula = None::<String>;
        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                row_count = event.parse_attribute_value::<u32>("r")?.unwrap_or(row_count + 1);
                col_count = 0;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count + 1));
                col_count = col;
                kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if let Some(format_id) = event.get_attribute_value("s")? {
                    if kind == CellType::Number && !format_id.is_empty() {
                        let index = format_id.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
                value = None;
                formula = None;
            }
            Event::Start(event) if event.name() == TAG_FORMULA => {
                let is_shared = event.get_attribute_value("t")?.map(|t| t == "shared").unwrap_or(false);
                let group = event.get_attribute_value("si")?.map(Cow::into_owned);
                let text = reader.read_text(TAG_FORMULA)?;
                formula = match (is_shared, group) {
                    (true, Some(group)) if text.trim().is_empty() => {
                        shared_formulas.get(&group).map(|(anchor_row, anchor_col, anchor)| {
                            translate_shared_formula(anchor, row as i64 - *anchor_row as i64, col as i64 - *anchor_col as i64)
                        })
                    }
                    (true, Some(group)) => {
                        shared_formulas.insert(group, (row, col, text.to_owned()));
                        Some(text)
                    }
                    _ if text.trim().is_empty() => None,
                    _ => Some(text),
                };
            }
            Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
            }
            Event::Start(event) if event.name() == TAG_VALUE => {
                value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
            }
            Event::End(event) if event.name() == TAG_CELL => {
                let cached = match value.take() {
                    // A cleared literal string is no content; a formula that yields "" still evaluated
                    Some(text) if text.is_empty() && formula.is_none() => None,
                    Some(text) if text.is_empty() && kind != CellType::InlineString && kind != CellType::SharedString => None,
                    Some(text) => Some(kind.to_scalar(&text, shared_strings).map_err(|_| {
                        SpreadsheetError::CellValueError(
                            self.name.to_owned(),
                            sheet_name.to_owned(),
                            index_to_reference(row, col),
                            text.to_owned(),
                        )
                    })?),
                    None => None,
                };
                sheet.push(Cell {
                    row,
                    col,
                    formula: formula.take().map(|text| format!("={text}")),
                    cached,
                });
            },
        });
        sheet.finish();
        debug!(sheet = sheet_name, rows = sheet.used_rows(), cols = sheet.used_cols(), "read xlsx sheet");
        Ok(sheet)
    }
}

/// Loads sheet names and paths from workbook.xml and detects the 1904 date system
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), EstimateSheetError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads the style index to cell type table from styles.xml
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, EstimateSheetError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(Cow::into_owned).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Loads the whole shared string table
fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, EstimateSheetError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)
                .with_prefix("xl/sharedStrings.xml")?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Reads string content up to `end_tag`, skipping phonetic runs.
/// `is_text_content` treats bare text as content (for `<v>`); otherwise only `<t>` runs count.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, EstimateSheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::cell::Scalar;
    use crate::spreadsheet::tests::archive;
    use crate::spreadsheet::Workbook;
    use chrono::NaiveDate;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr/>
  <sheets>
    <sheet name="Cost New" sheetId="1" r:id="rId1"/>
    <sheet name="Notes" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="mm/dd/yyyy"/></numFmts>
  <cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="4"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>EXCAVATION</t></si>
  <si><r><t>Dig </t></r><r><t>&amp; haul</t></r></si>
  <si><t>Bid Date</t><rPh><t>ignored</t></rPh></si>
  <si><t>EXCAVATION TOTAL</t></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1">
      <c r="A1" t="s"><v>0</v></c>
    </row>
    <row r="2">
      <c r="A2" t="s"><v>1</v></c>
      <c r="B2" s="2"><v>12</v></c>
      <c r="C2"><v>45.5</v></c>
      <c r="D2"><f t="shared" ref="D2:D3" si="0">B2*C2</f><v>546</v></c>
    </row>
    <row r="3">
      <c r="A3" t="inlineStr"><is><t>Spoils</t></is></c>
      <c r="B3"><v>3</v></c>
      <c r="C3"><v>100</v></c>
      <c r="D3"><f t="shared" si="0"/><v>300</v></c>
    </row>
    <row r="4">
      <c r="A4" t="s"><v>3</v></c>
      <c r="D4"><f>SUM(D2:D3)</f></c>
    </row>
    <row r="6">
      <c r="A6" t="s"><v>2</v></c>
      <c r="B6" s="1"><v>45292</v></c>
      <c r="C6" t="b"><v>1</v></c>
      <c r="D6" t="e"><f>D4/0</f><v>#DIV/0!</v></c>
      <c r="E6" t="str"><f>A1&amp;"!"</f><v>EXCAVATION!</v></c>
    </row>
  </sheetData>
</worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;

    fn workbook(mode: ReadMode) -> Workbook {
        let bytes = archive(&[
            ("[Content_Types].xml", "<Types/>"),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELATIONSHIPS),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        Workbook::from_bytes("estimate.xlsx", bytes, mode).unwrap()
    }

    #[test]
    fn test_sheet_names_in_workbook_order() {
        assert_eq!(workbook(ReadMode::Raw).sheet_names(), vec!["Cost New", "Notes"]);
    }

    #[test]
    fn test_raw_mode_reads_formulas() {
        let sheet = workbook(ReadMode::Raw).sheet(Some("Cost New")).unwrap();
        assert_eq!(sheet.cell(1, 1), CellValue::Literal(Scalar::Text("EXCAVATION".to_owned())));
        assert_eq!(sheet.cell(2, 1), CellValue::Literal(Scalar::Text("Dig & haul".to_owned())));
        assert_eq!(sheet.cell(3, 1), CellValue::Literal(Scalar::Text("Spoils".to_owned())));
        assert_eq!(sheet.cell(2, 4), CellValue::Formula("=B2*C2".to_owned()));
        assert_eq!(sheet.cell(3, 4), CellValue::Formula("=B3*C3".to_owned()));
        assert_eq!(sheet.cell(4, 4), CellValue::Formula("=SUM(D2:D3)".to_owned()));
        assert_eq!(sheet.cell(6, 5), CellValue::Formula("=A1&\"!\"".to_owned()));
    }

    #[test]
    fn test_computed_mode_reads_cached_values() {
        let sheet = workbook(ReadMode::Computed).sheet(Some("Cost New")).unwrap();
        assert_eq!(sheet.cell(2, 2), CellValue::Literal(Scalar::Number(12.0)));
        assert_eq!(sheet.cell(2, 4), CellValue::Literal(Scalar::Number(546.0)));
        assert_eq!(sheet.cell(3, 4), CellValue::Literal(Scalar::Number(300.0)));
        assert_eq!(sheet.cell(4, 4), CellValue::Empty);
        assert!(sheet.is_stale(4, 4));
        assert_eq!(sheet.cell(6, 1), CellValue::Literal(Scalar::Text("Bid Date".to_owned())));
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(sheet.cell(6, 2), CellValue::Literal(Scalar::Date(date)));
        assert_eq!(sheet.cell(6, 3), CellValue::Literal(Scalar::Bool(true)));
        assert_eq!(sheet.cell(6, 4), CellValue::Literal(Scalar::Error("#DIV/0!".to_owned())));
        assert_eq!(sheet.cell(6, 5), CellValue::Literal(Scalar::Text("EXCAVATION!".to_owned())));
    }

    #[test]
    fn test_missing_sheet() {
        let result = workbook(ReadMode::Raw).sheet(Some("Summary"));
        assert!(matches!(
            result,
            Err(EstimateSheetError::SpreadsheetError(SpreadsheetError::SheetMissing(_, name))) if name == "Summary"
        ));
    }

    #[test]
    fn test_default_sheet_is_first() {
        let sheet = workbook(ReadMode::Raw).sheet(None).unwrap();
        assert_eq!(sheet.name, "Cost New");
        assert!(workbook(ReadMode::Raw).sheet(Some("Notes")).unwrap().is_empty());
    }
}
