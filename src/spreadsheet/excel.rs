//! OOXML package helpers: container opening, relationships and number formats
use crate::error::EstimateSheetError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Opened package parts shared by the OOXML readers
pub(super) struct Package {
    pub(super) zip: ZipArchive<UnifiedReader>,
    /// Cell type per style index
    pub(super) number_formats: Vec<CellType>,
    /// (sheet name, zip path) in workbook order
    pub(super) sheets: Vec<(String, String)>,
}

/// Opens an OOXML container and loads sheet list and number formats
///
/// # Arguments
/// * `file_name` - Path or URL, used in error messages
/// * `reader` - Workbook bytes
/// * `load_workbook` - Loads (sheets, is_1904) from the package
/// * `load_number_formats` - Loads the style index to cell type table
pub(super) fn open<W, F>(
    file_name: &str,
    reader: UnifiedReader,
    load_workbook: W,
    load_number_formats: F,
) -> Result<Package, EstimateSheetError>
where
    W: Fn(&mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, bool), EstimateSheetError>,
    F: Fn(&mut ZipArchive<UnifiedReader>, bool) -> Result<Vec<CellType>, EstimateSheetError>,
{
    // Encrypted packages are CFB containers, not zip archives
    let mut zip = ZipArchive::new(reader)
        .map_err(|error| SpreadsheetError::UnsupportedFormat(file_name.to_owned(), error.to_string()))?;
    let (sheets, is_1904) = load_workbook(&mut zip)
        .map_err(|error| SpreadsheetError::UnsupportedFormat(file_name.to_owned(), error.to_string()))?;
    if sheets.is_empty() {
        Err(SpreadsheetError::EmptyWorkbook(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok(Package {
        zip,
        number_formats,
        sheets,
    })
}

/// Loads worksheet relationships, mapping relationship ids to part paths
pub(super) fn load_relationships(zip: &mut ZipArchive<UnifiedReader>, path: &str) -> Result<HashMap<String, String>, EstimateSheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps style format ids to cell types using custom and built-in formats
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the archive
pub(super) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_zip_path() {
        assert_eq!(to_zip_path(Cow::from("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::from("/xl/worksheets/sheet2.xml")), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path(Cow::from("xl/worksheets/sheet3.xml")), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn test_number_formats_prefer_custom() {
        let custom = HashMap::from([("164".to_owned(), CellType::NumberDate1900)]);
        let formats = load_number_formats(
            vec!["0".to_owned(), "14".to_owned(), "164".to_owned(), "4".to_owned()],
            custom,
            false,
        );
        assert_eq!(formats, vec![
            CellType::Number,
            CellType::NumberDate1900,
            CellType::NumberDate1900,
            CellType::Number,
        ]);
    }
}
