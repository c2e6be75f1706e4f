//! Record buffering and chunked output shared by the table functions.

use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::Scalar;
use duckdb::core::DataChunkHandle;
use duckdb::core::FlatVector;
use duckdb::core::Inserter;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Rows per output chunk, DuckDB's standard vector size
const CHUNK_SIZE: usize = 2048;

/// Type of a result column
#[derive(Copy, Clone, Debug, PartialEq)]
pub(super) enum ColumnType {
    Varchar,
    Double,
    Boolean,
}

impl ColumnType {
    fn to_logical_type_id(self) -> LogicalTypeId {
        match self {
            ColumnType::Varchar => LogicalTypeId::Varchar,
            ColumnType::Double => LogicalTypeId::Double,
            ColumnType::Boolean => LogicalTypeId::Boolean,
        }
    }
}

/// One output value; `Null` writes SQL NULL whatever the column type
#[derive(Clone, Debug, PartialEq)]
pub(super) enum Field {
    Null,
    Varchar(String),
    Double(f64),
    Boolean(bool),
}

impl Field {
    pub(super) fn varchar(text: impl Into<String>) -> Self {
        Field::Varchar(text.into())
    }

    pub(super) fn optional_varchar(text: Option<String>) -> Self {
        text.map(Field::Varchar).unwrap_or(Field::Null)
    }

    /// Display text of a cell value
    pub(super) fn value(value: &CellValue) -> Self {
        Field::optional_varchar(value.display())
    }

    /// Number of a cell value, NULL unless it is a numeric literal
    pub(super) fn number(value: &CellValue) -> Self {
        value.as_number().map(Field::Double).unwrap_or(Field::Null)
    }

    /// Formula text of a cell value, NULL unless it is a formula
    pub(super) fn formula(value: &CellValue) -> Self {
        match value {
            CellValue::Formula(formula) => Field::varchar(formula.as_str()),
            _ => Field::Null,
        }
    }

    pub(super) fn scalar(value: Option<&Scalar>) -> Self {
        Field::optional_varchar(value.map(Scalar::to_string))
    }
}

/// Registers the result columns of a table function
pub(super) fn add_result_columns(bind: &BindInfo, columns: &[(&str, ColumnType)]) {
    for (name, kind) in columns {
        bind.add_result_column(name, LogicalTypeHandle::from(kind.to_logical_type_id()));
    }
}

/// Records produced at bind time
#[repr(C)]
pub(crate) struct RecordsBindData {
    pub(super) records: Vec<Vec<Field>>,
}

/// Position of the next chunk
#[repr(C)]
pub(crate) struct RecordsInitData {
    index: AtomicUsize,
}

impl RecordsInitData {
    pub(super) fn new() -> Self {
        RecordsInitData {
            index: AtomicUsize::new(0),
        }
    }
}

/// Writes the next chunk of records, or an empty chunk when all were written
pub(super) fn write_chunk(bind: &RecordsBindData, init: &RecordsInitData, output: &mut DataChunkHandle) {
    let start = init.index.fetch_add(CHUNK_SIZE, Ordering::Relaxed);
    let end = bind.records.len().min(start.saturating_add(CHUNK_SIZE));
    if start >= end {
        output.set_len(0);
        return;
    }

    let width = bind.records[start].len();
    let mut vectors: Vec<_> = (0..width).map(|index| output.flat_vector(index)).collect();
    for (row, record) in bind.records[start..end].iter().enumerate() {
        for (field, vector) in record.iter().zip(vectors.iter_mut()) {
            write_to_vector(vector, row, field);
        }
    }
    output.set_len(end - start);
}

fn write_to_vector(vector: &mut FlatVector, row: usize, field: &Field) {
    match field {
        Field::Null => vector.set_null(row),
        Field::Varchar(text) => vector.insert(row, text.as_str()),
        Field::Double(number) => write_primitive(vector, row, *number),
        Field::Boolean(value) => write_primitive(vector, row, *value),
    }
}

/// Writes a primitive value directly to a vector using pointer arithmetic.
fn write_primitive<T>(vector: &mut FlatVector, index: usize, value: T) {
    let pointer: *mut T = vector.as_mut_ptr();
    unsafe {
        std::ptr::write(pointer.add(index), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_fields() {
        let formula = CellValue::Formula("=SUM(D2:D4)".to_owned());
        assert_eq!(Field::value(&formula), Field::varchar("=SUM(D2:D4)"));
        assert_eq!(Field::number(&formula), Field::Null);
        assert_eq!(Field::formula(&formula), Field::varchar("=SUM(D2:D4)"));

        let number = CellValue::Literal(Scalar::Number(102.5));
        assert_eq!(Field::value(&number), Field::varchar("102.5"));
        assert_eq!(Field::number(&number), Field::Double(102.5));
        assert_eq!(Field::formula(&number), Field::Null);

        assert_eq!(Field::value(&CellValue::Empty), Field::Null);
        assert_eq!(Field::scalar(None), Field::Null);
    }
}
