//! A1-style cell references.
//!
//! Rows and columns are 1-based throughout the crate: `A1` is `(1, 1)`.

use std::fmt::Display;

/// Position of a cell within a named sheet
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub sheet: String,
    pub row: u32,
    pub col: u32,
}

impl Coordinate {
    pub fn new(sheet: &str, row: u32, col: u32) -> Self {
        Coordinate {
            sheet: sheet.to_owned(),
            row,
            col,
        }
    }

    /// Returns the A1 reference without the sheet name, e.g. `B3`
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Moves the coordinate by a signed offset, `None` if it falls off the sheet
    pub fn offset(&self, delta_row: i32, delta_col: i32) -> Option<Coordinate> {
        let row = self.row.checked_add_signed(delta_row).filter(|row| *row > 0)?;
        let col = self.col.checked_add_signed(delta_col).filter(|col| *col > 0)?;
        Some(Coordinate {
            sheet: self.sheet.to_owned(),
            row,
            col,
        })
    }
}

/// Sheet names are quoted unless they are plain identifiers such as `Summary` or `Cost_2024`
fn needs_quotes(sheet: &str) -> bool {
    sheet.is_empty()
        || sheet.starts_with(|c: char| c.is_ascii_digit())
        || !sheet.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if needs_quotes(&self.sheet) {
            write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.reference())
        } else {
            write!(f, "{}!{}", self.sheet, self.reference())
        }
    }
}

/// Converts column letters to a 1-based column number: A = 1, Z = 26, AA = 27
pub fn col_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0u32, |index, byte| {
            index.checked_mul(26)?.checked_add((byte - b'A' + 1) as u32)
        })
}

/// Converts a 1-based column number to letters
pub fn index_to_col(col: u32) -> String {
    let mut letters = Vec::new();
    let mut remaining = col;
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push(b'A' + digit as u8);
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts a 1-based (row, col) pair to an A1 reference
pub fn index_to_reference(row: u32, col: u32) -> String {
    format!("{}{}", index_to_col(col), row)
}

/// Parses an A1 reference (absolute markers allowed) to a 1-based (row, col) pair
pub fn reference_to_index(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let col = col_to_index(letters)?;
    let row = digits.parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(col_to_index("A"), Some(1));
        assert_eq!(col_to_index("z"), Some(26));
        assert_eq!(col_to_index("AA"), Some(27));
        assert_eq!(col_to_index("XFD"), Some(16_384));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);

        assert_eq!(index_to_col(1), "A");
        assert_eq!(index_to_col(26), "Z");
        assert_eq!(index_to_col(27), "AA");
        assert_eq!(index_to_col(702), "ZZ");
        assert_eq!(index_to_col(703), "AAA");
    }

    #[test]
    fn test_display_quotes_sheet_names() {
        assert_eq!(Coordinate::new("Estimate", 3, 2).to_string(), "Estimate!B3");
        assert_eq!(Coordinate::new("Cost_2024", 1, 1).to_string(), "Cost_2024!A1");
        assert_eq!(Coordinate::new("Cost New", 5, 4).to_string(), "'Cost New'!D5");
        assert_eq!(Coordinate::new("Labor (Phase 1)", 2, 2).to_string(), "'Labor (Phase 1)'!B2");
        assert_eq!(Coordinate::new("Tile&Coping", 3, 1).to_string(), "'Tile&Coping'!A3");
        assert_eq!(Coordinate::new("2024", 1, 2).to_string(), "'2024'!B1");
        assert_eq!(Coordinate::new("Bob's", 1, 1).to_string(), "'Bob''s'!A1");
    }

    #[test]
    fn test_references() {
        assert_eq!(index_to_reference(3, 2), "B3");
        assert_eq!(reference_to_index("B3"), Some((3, 2)));
        assert_eq!(reference_to_index("$D$25"), Some((25, 4)));
        assert_eq!(reference_to_index("D0"), None);
        assert_eq!(reference_to_index("17"), None);
        assert_eq!(reference_to_index("D"), None);
    }

    #[test]
    fn test_coordinate_offset_stays_on_sheet() {
        let origin = Coordinate::new("Estimate", 1, 1);
        assert_eq!(origin.offset(0, 1), Some(Coordinate::new("Estimate", 1, 2)));
        assert_eq!(origin.offset(0, -1), None);
        assert_eq!(origin.offset(-1, 0), None);
        assert_eq!(Coordinate::new("Estimate", 4, 3).offset(-1, -2), Some(Coordinate::new("Estimate", 3, 1)));
    }
}
