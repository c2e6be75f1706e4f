//! Shared formula expansion.
//!
//! OOXML stores a formula that is filled down or across once, on its anchor cell,
//! and marks dependent cells with the same group index. A dependent's own text
//! is the anchor formula with every relative reference moved by the distance
//! between the two cells.

use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::index_to_col;
use regex::Captures;
use regex::Regex;
use std::sync::OnceLock;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?P<string>"(?:[^"]|"")*")"#,
            r"|(?P<function>[A-Za-z_][A-Za-z0-9_.]*\()",
            r"|(?P<sheet>(?:'(?:[^']|'')+'|[A-Za-z0-9_.]+)!)?(?:",
            r"(?P<first_col_abs>\$?)(?P<first_col>[A-Za-z]{1,3}):(?P<last_col_abs>\$?)(?P<last_col>[A-Za-z]{1,3})",
            r"|(?P<first_row_abs>\$?)(?P<first_row>[0-9]+):(?P<last_row_abs>\$?)(?P<last_row>[0-9]+)",
            r"|(?P<col_abs>\$?)(?P<col>[A-Za-z]{1,3})(?P<row_abs>\$?)(?P<row>[0-9]+)",
            r")",
        )).expect("Hardcode regex pattern")
    })
}

fn is_name_char(character: char) -> bool {
    character.is_alphanumeric() || character == '_' || character == '.'
}

/// Column letters moved by `shift` unless marked absolute with `$`
fn shift_col(absolute: &str, letters: &str, shift: i64) -> Option<String> {
    let col = col_to_index(letters)? as i64;
    let col = if absolute.is_empty() { (col + shift).max(1) } else { col };
    Some(format!("{absolute}{}", index_to_col(col as u32)))
}

/// Row number moved by `shift` unless marked absolute with `$`
fn shift_row(absolute: &str, digits: &str, shift: i64) -> Option<String> {
    let row = digits.parse::<i64>().ok()?;
    let row = if absolute.is_empty() { (row + shift).max(1) } else { row };
    Some(format!("{absolute}{row}"))
}

/// Moves the relative references of `formula` by the given row and column distance.
/// Absolute parts (`$A`, `$1`), string literals and function names are left alone.
pub(crate) fn translate_shared_formula(formula: &str, row_shift: i64, col_shift: i64) -> String {
    if row_shift == 0 && col_shift == 0 {
        return formula.to_owned();
    }
    reference_pattern()
        .replace_all(formula, |captures: &Captures| {
            let Some(whole) = captures.get(0) else {
                return String::new();
            };
            if captures.name("string").is_some() || captures.name("function").is_some() {
                return whole.as_str().to_owned();
            }
            // part of a longer name such as `Rate2024` or `Q1_Total`
            let before = formula[..whole.start()].chars().next_back();
            let after = formula[whole.end()..].chars().next();
            if before.is_some_and(|c| is_name_char(c) || c == '$') || after.is_some_and(|c| is_name_char(c) || c == '(') {
                return whole.as_str().to_owned();
            }
            let text = |name: &str| captures.name(name).map(|m| m.as_str()).unwrap_or_default();
            let moved = if captures.name("first_col").is_some() {
                // whole columns, `C:E`
                shift_col(text("first_col_abs"), text("first_col"), col_shift)
                    .zip(shift_col(text("last_col_abs"), text("last_col"), col_shift))
                    .map(|(first, last)| format!("{first}:{last}"))
            } else if captures.name("first_row").is_some() {
                // whole rows, `2:4`
                shift_row(text("first_row_abs"), text("first_row"), row_shift)
                    .zip(shift_row(text("last_row_abs"), text("last_row"), row_shift))
                    .map(|(first, last)| format!("{first}:{last}"))
            } else {
                shift_col(text("col_abs"), text("col"), col_shift)
                    .zip(shift_row(text("row_abs"), text("row"), row_shift))
                    .map(|(col, row)| format!("{col}{row}"))
            };
            match moved {
                Some(moved) => format!("{}{}", text("sheet"), moved),
                None => whole.as_str().to_owned(),
            }
        })
        .into_owned()
}

fn odf_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?P<string>"(?:[^"]|"")*")"#,
            r"|\[\$?(?P<sheet>'(?:[^']|'')+'|[^\.\[\]':]*)\.(?P<start>\$?[A-Za-z]+\$?[0-9]+)",
            r"(?::\$?(?P<end_sheet>'(?:[^']|'')+'|[^\.\[\]':]*)\.(?P<end>\$?[A-Za-z]+\$?[0-9]+))?\]",
        )).expect("Hardcode regex pattern")
    })
}

/// Rewrites an OpenFormula expression (`of:=SUM([.D2:.D4])`) in A1 notation (`=SUM(D2:D4)`).
/// Sheet-qualified references become `Sheet!A1`; argument separators become commas.
pub(crate) fn translate_odf_formula(formula: &str) -> String {
    let body = formula
        .split_once(':')
        .filter(|(namespace, _)| namespace.chars().all(|c| c.is_ascii_alphanumeric()) && !namespace.is_empty())
        .map(|(_, body)| body)
        .unwrap_or(formula);
    let body = body.strip_prefix('=').unwrap_or(body);
    let translated = odf_reference_pattern().replace_all(body, |captures: &Captures| {
        let text = |name: &str| captures.name(name).map(|m| m.as_str()).unwrap_or_default();
        if captures.name("string").is_some() {
            return text("string").to_owned();
        }
        let mut reference = String::new();
        if !text("sheet").is_empty() {
            reference.push_str(text("sheet"));
            reference.push('!');
        }
        reference.push_str(text("start"));
        if !text("end").is_empty() {
            reference.push(':');
            reference.push_str(text("end"));
        }
        reference
    });

    // Separators outside string literals
    let mut result = String::with_capacity(translated.len() + 1);
    result.push('=');
    let mut is_literal = false;
    for character in translated.chars() {
        match character {
            '"' => {
                is_literal = !is_literal;
                result.push(character);
            }
            ';' if !is_literal => result.push(','),
            _ => result.push(character),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_down() {
        assert_eq!(translate_shared_formula("=B2*C2", 1, 0), "=B3*C3");
        assert_eq!(translate_shared_formula("=SUM(D2:D9)", 3, 0), "=SUM(D5:D12)");
        assert_eq!(translate_shared_formula("=SUM(2:2)+B2", 1, 0), "=SUM(3:3)+B3");
        assert_eq!(translate_shared_formula("=SUM($2:4)", 2, 0), "=SUM($2:6)");
        assert_eq!(translate_shared_formula("=SUM(C:C)", 1, 0), "=SUM(C:C)");
    }

    #[test]
    fn test_fill_across() {
        assert_eq!(translate_shared_formula("=B2+B3", 0, 2), "=D2+D3");
        assert_eq!(translate_shared_formula("=SUM(C:C)*B2", 0, 1), "=SUM(D:D)*C2");
        assert_eq!(translate_shared_formula("=SUM(Costs!$C:E)", 0, 1), "=SUM(Costs!$C:F)");
        assert_eq!(translate_shared_formula("=SUM(2:2)", 0, 1), "=SUM(2:2)");
    }

    #[test]
    fn test_absolute_parts_stay() {
        assert_eq!(translate_shared_formula("=B2*$E$1", 2, 1), "=C4*$E$1");
        assert_eq!(translate_shared_formula("=$B2*B$1", 2, 1), "=$B4*C$1");
    }

    #[test]
    fn test_sheet_qualified_references() {
        assert_eq!(translate_shared_formula("='Cost New'!D5+Summary!A1", 1, 0), "='Cost New'!D6+Summary!A2");
    }

    #[test]
    fn test_strings_and_functions_untouched() {
        assert_eq!(translate_shared_formula("=IF(A2>0,\"A1\",LOG10(A2))", 1, 0), "=IF(A3>0,\"A1\",LOG10(A3))");
    }

    #[test]
    fn test_odf_formulas() {
        assert_eq!(translate_odf_formula("of:=SUM([.D2:.D4])"), "=SUM(D2:D4)");
        assert_eq!(translate_odf_formula("of:=[.B2]*[.C2]"), "=B2*C2");
        assert_eq!(translate_odf_formula("of:=IF([.A1]>0;\"a;b\";[$Summary.$D$5])"), "=IF(A1>0,\"a;b\",Summary!$D$5)");
        assert_eq!(translate_odf_formula("of:=['Cost New'.D5]"), "='Cost New'!D5");
    }
}
