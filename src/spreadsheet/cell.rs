use crate::error::EstimateSheetError;
use crate::extraction::config::ConfigError;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use iso8601_duration::Duration as IsoDuration;
use std::fmt::Display;

/// A literal cell value: either typed in by hand or cached from a formula evaluation
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Bool(bool),
    /// Spreadsheet error literal such as `#DIV/0!`
    Error(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(text) => write!(f, "{text}"),
            Scalar::Number(number) => write!(f, "{number}"),
            Scalar::Date(datetime) => {
                if datetime.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", datetime.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Scalar::Bool(value) => write!(f, "{}", if *value { "true" } else { "false" }),
            Scalar::Error(code) => write!(f, "{code}"),
        }
    }
}

/// What a cell holds, as seen through one [`ReadMode`]
#[derive(Clone, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Literal(Scalar),
    /// Formula text including the leading `=`
    Formula(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Literal(scalar) => scalar.as_number(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Literal(scalar) => scalar.as_text(),
            _ => None,
        }
    }

    /// Display text of the value; formula text for formulas, `None` when empty
    pub fn display(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Literal(scalar) => Some(scalar.to_string()),
            CellValue::Formula(formula) => Some(formula.to_owned()),
        }
    }
}

/// How formula cells are read
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Formula cells yield their formula text
    #[default]
    Raw,
    /// Every cell yields its cached value
    Computed,
}

impl ReadMode {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "raw" | "formula" | "formulas" => Ok(ReadMode::Raw),
            "computed" | "value" | "values" => Ok(ReadMode::Computed),
            _ => Err(ConfigError::ReadModeError(text.to_owned())),
        }
    }
}

/// Encoding of a raw cell value inside the workbook part
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Number,
    /// Number formatted as a date in the 1900 date system
    NumberDate1900,
    /// Number formatted as a date in the 1904 date system
    NumberDate1904,
    Boolean,
    SharedString,
    InlineString,
    IsoDateTime,
    IsoDuration,
    Error,
}

impl CellType {
    /// Built-in Excel number format ids that render dates or times
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "45" | "46" | "47" => {
                Some(Self::date(is_1904))
            }
            _ => None,
        }
    }

    /// Scans a custom format code for date or time tokens outside literals and brackets
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::date(is_1904)
        } else {
            Self::Number
        }
    }

    fn date(is_1904: bool) -> Self {
        if is_1904 {
            Self::NumberDate1904
        } else {
            Self::NumberDate1900
        }
    }

    /// Decodes a raw workbook value of this type into a literal
    pub(crate) fn to_scalar(self, value: &str, shared_strings: &[String]) -> Result<Scalar, EstimateSheetError> {
        let scalar = match self {
            CellType::Number => Scalar::Number(value.trim().parse::<f64>()?),
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                let serial = value.trim().parse::<f64>()?;
                match serial_to_datetime(serial, self == CellType::NumberDate1904) {
                    Some(datetime) => Scalar::Date(datetime),
                    None => Scalar::Number(serial),
                }
            }
            CellType::Boolean => Scalar::Bool(value.trim() == "1" || value.trim().eq_ignore_ascii_case("true")),
            CellType::SharedString => {
                let index = value.trim().parse::<usize>()?;
                Scalar::Text(shared_strings.get(index).cloned().unwrap_or_default())
            }
            CellType::InlineString => Scalar::Text(value.to_owned()),
            CellType::IsoDateTime => Scalar::Date(parse_iso_datetime(value)?),
            CellType::IsoDuration => match value.parse::<IsoDuration>() {
                Ok(duration) => {
                    let seconds = duration.hour as f64 * 3600.0 + duration.minute as f64 * 60.0 + duration.second as f64;
                    Scalar::Number(seconds / 86_400.0)
                }
                Err(_) => Scalar::Text(value.to_owned()),
            },
            CellType::Error => Scalar::Error(value.to_owned()),
        };
        Ok(scalar)
    }
}

/// Converts a spreadsheet date serial to a timestamp.
/// Serials below 60 in the 1900 system sit before the phantom 1900-02-29.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let microseconds = (serial.fract() * 86_400_000_000f64).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(days + offset))?
        .checked_add_signed(Duration::microseconds(microseconds))
}

fn parse_iso_datetime(value: &str) -> Result<NaiveDateTime, EstimateSheetError> {
    let value = value.trim();
    if value.contains('T') {
        let value = value.trim_end_matches('Z');
        Ok(NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")?)
    } else {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
        Ok(date.and_time(chrono::NaiveTime::MIN))
    }
}

/// A stored cell: the formula text it carries, if any, and the value cached in the file
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row number (1-based)
    pub row: u32,
    /// Column number (1-based)
    pub col: u32,
    /// Formula text including the leading `=`
    pub formula: Option<String>,
    /// Literal content, or the last computed result of the formula
    pub cached: Option<Scalar>,
}

impl Cell {
    pub fn literal(row: u32, col: u32, value: Scalar) -> Self {
        Cell {
            row,
            col,
            formula: None,
            cached: Some(value),
        }
    }

    pub fn formula(row: u32, col: u32, formula: &str, cached: Option<Scalar>) -> Self {
        let formula = if formula.starts_with('=') {
            formula.to_owned()
        } else {
            format!("={formula}")
        };
        Cell {
            row,
            col,
            formula: Some(formula),
            cached,
        }
    }

    /// A formula whose result was never cached by the authoring application
    pub fn is_stale(&self) -> bool {
        self.formula.is_some() && self.cached.is_none()
    }

    /// Projects the stored cell through a read mode
    pub fn value(&self, mode: ReadMode) -> CellValue {
        match (mode, &self.formula, &self.cached) {
            (ReadMode::Raw, Some(formula), _) => CellValue::Formula(formula.to_owned()),
            (_, _, Some(scalar)) => CellValue::Literal(scalar.to_owned()),
            _ => CellValue::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_datetime(1.0, false), Some(date(1900, 1, 1)));
        assert_eq!(serial_to_datetime(59.0, false), Some(date(1900, 2, 28)));
        assert_eq!(serial_to_datetime(61.0, false), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_datetime(45_292.0, false), Some(date(2024, 1, 1)));
        assert_eq!(serial_to_datetime(0.0, true), Some(date(1904, 1, 1)));
        assert_eq!(
            serial_to_datetime(45_292.5, false),
            Some(date(2024, 1, 1) + Duration::hours(12))
        );
        assert_eq!(serial_to_datetime(-1.0, false), None);
    }

    #[test]
    fn test_custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("h:mm AM/PM", true), CellType::NumberDate1904);
        assert_eq!(CellType::parse_custom_number_format("\"$\"#,##0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]#,##0;\"days\"", false), CellType::Number);
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("4", false), None);
    }

    #[test]
    fn test_to_scalar() {
        let strings = vec!["EXCAVATION".to_owned()];
        assert_eq!(CellType::Number.to_scalar("1500.5", &strings).unwrap(), Scalar::Number(1500.5));
        assert_eq!(CellType::SharedString.to_scalar("0", &strings).unwrap(), Scalar::Text("EXCAVATION".to_owned()));
        assert_eq!(CellType::Boolean.to_scalar("1", &strings).unwrap(), Scalar::Bool(true));
        assert_eq!(CellType::Error.to_scalar("#DIV/0!", &strings).unwrap(), Scalar::Error("#DIV/0!".to_owned()));
        assert_eq!(CellType::IsoDateTime.to_scalar("2024-03-01", &strings).unwrap(), Scalar::Date(date(2024, 3, 1)));
        assert_eq!(CellType::IsoDuration.to_scalar("PT12H00M00S", &strings).unwrap(), Scalar::Number(0.5));
        assert!(CellType::Number.to_scalar("abc", &strings).is_err());
    }

    #[test]
    fn test_cell_value_by_mode() {
        let total = Cell::formula(5, 4, "SUM(D2:D4)", Some(Scalar::Number(1200.0)));
        assert_eq!(total.value(ReadMode::Raw), CellValue::Formula("=SUM(D2:D4)".to_owned()));
        assert_eq!(total.value(ReadMode::Computed), CellValue::Literal(Scalar::Number(1200.0)));
        assert!(!total.is_stale());

        let stale = Cell::formula(6, 4, "=D5*2", None);
        assert!(stale.is_stale());
        assert_eq!(stale.value(ReadMode::Computed), CellValue::Empty);

        let label = Cell::literal(1, 1, Scalar::Text("Pool Size".to_owned()));
        assert_eq!(label.value(ReadMode::Raw), label.value(ReadMode::Computed));
    }

    #[test]
    fn test_read_mode_parse() {
        assert_eq!(ReadMode::parse("RAW").unwrap(), ReadMode::Raw);
        assert_eq!(ReadMode::parse(" computed ").unwrap(), ReadMode::Computed);
        assert!(ReadMode::parse("evaluated").is_err());
    }
}
