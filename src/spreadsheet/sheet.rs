use crate::extraction::config::ScanBounds;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::ReadMode;
use crate::spreadsheet::reference::Coordinate;
use std::collections::HashMap;
use tracing::debug;

/// One worksheet loaded into memory.
///
/// Cells are kept in row-major order with a position index, so lookups by
/// coordinate are constant time and scans stay in reading order.
#[derive(Clone, Debug)]
pub struct Worksheet {
    /// Sheet name as shown on the tab
    pub name: String,
    /// Mode used by [`Worksheet::cell`]
    pub mode: ReadMode,
    cells: Vec<Cell>,
    positions: HashMap<(u32, u32), usize>,
    row_upper_bound: u32,
    col_upper_bound: u32,
}

impl Worksheet {
    /// Builds a worksheet from stored cells. Later cells win on duplicate positions.
    pub fn from_cells(name: &str, mode: ReadMode, cells: Vec<Cell>) -> Self {
        let mut sheet = Worksheet {
            name: name.to_owned(),
            mode,
            cells: Vec::with_capacity(cells.len()),
            positions: HashMap::with_capacity(cells.len()),
            row_upper_bound: 0,
            col_upper_bound: 0,
        };
        for cell in cells {
            sheet.push(cell);
        }
        sheet.finish();
        sheet
    }

    pub(crate) fn push(&mut self, cell: Cell) {
        if cell.formula.is_none() && cell.cached.is_none() {
            return;
        }
        self.row_upper_bound = self.row_upper_bound.max(cell.row);
        self.col_upper_bound = self.col_upper_bound.max(cell.col);
        match self.positions.get(&(cell.row, cell.col)) {
            Some(index) => self.cells[*index] = cell,
            None => {
                self.positions.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    /// Restores row-major order after out-of-order pushes and rebuilds the index
    pub(crate) fn finish(&mut self) {
        if self.cells.windows(2).any(|pair| (pair[0].row, pair[0].col) > (pair[1].row, pair[1].col)) {
            self.cells.sort_by_key(|cell| (cell.row, cell.col));
            self.positions = self.cells
                .iter()
                .enumerate()
                .map(|(index, cell)| ((cell.row, cell.col), index))
                .collect();
        }
    }

    /// Reads a cell with the mode the workbook was opened with
    pub fn cell(&self, row: u32, col: u32) -> CellValue {
        self.get(row, col, self.mode)
    }

    /// Reads a cell with an explicit mode. Missing cells are `Empty`.
    pub fn get(&self, row: u32, col: u32, mode: ReadMode) -> CellValue {
        match self.stored(row, col) {
            Some(cell) => {
                if mode == ReadMode::Computed && cell.is_stale() {
                    debug!(cell = %Coordinate::new(&self.name, row, col), "formula has no cached value");
                }
                cell.value(mode)
            }
            None => CellValue::Empty,
        }
    }

    /// The stored cell at a position, if any
    pub fn stored(&self, row: u32, col: u32) -> Option<&Cell> {
        self.positions.get(&(row, col)).map(|index| &self.cells[*index])
    }

    /// Whether a COMPUTED read of this position returns `Empty` only because no result was cached
    pub fn is_stale(&self, row: u32, col: u32) -> bool {
        self.stored(row, col).map(Cell::is_stale).unwrap_or(false)
    }

    /// Stale formula cells inside the bounds, in row-major order
    pub fn stale_cells(&self, bounds: &ScanBounds) -> Vec<Coordinate> {
        self.cells
            .iter()
            .filter(|cell| cell.is_stale() && bounds.contains(cell.row, cell.col))
            .map(|cell| Coordinate::new(&self.name, cell.row, cell.col))
            .collect()
    }

    /// Stored cells inside the bounds, in row-major order
    pub fn cells_in<'a>(&'a self, bounds: &'a ScanBounds) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells
            .iter()
            .filter(move |cell| bounds.contains(cell.row, cell.col))
    }

    /// Last occupied row, 0 for an empty sheet
    pub fn used_rows(&self) -> u32 {
        self.row_upper_bound
    }

    /// Last occupied column, 0 for an empty sheet
    pub fn used_cols(&self) -> u32 {
        self.col_upper_bound
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn coordinate(&self, row: u32, col: u32) -> Coordinate {
        Coordinate::new(&self.name, row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::Scalar;

    fn sheet() -> Worksheet {
        Worksheet::from_cells("Estimate", ReadMode::Raw, vec![
            Cell::literal(2, 1, Scalar::Text("Pool Size".to_owned())),
            Cell::literal(2, 2, Scalar::Number(450.0)),
            Cell::formula(1, 4, "=B2*2", Some(Scalar::Number(900.0))),
            Cell::formula(3, 4, "=D1+1", None),
        ])
    }

    #[test]
    fn test_cells_are_row_major() {
        let sheet = sheet();
        let bounds = ScanBounds::new(1, 1, 10, 10);
        let positions: Vec<_> = sheet.cells_in(&bounds).map(|cell| (cell.row, cell.col)).collect();
        assert_eq!(positions, vec![(1, 4), (2, 1), (2, 2), (3, 4)]);
        assert_eq!(sheet.used_rows(), 3);
        assert_eq!(sheet.used_cols(), 4);
    }

    #[test]
    fn test_cell_reads() {
        let sheet = sheet();
        assert_eq!(sheet.cell(1, 4), CellValue::Formula("=B2*2".to_owned()));
        assert_eq!(sheet.get(1, 4, ReadMode::Computed), CellValue::Literal(Scalar::Number(900.0)));
        assert_eq!(sheet.cell(9, 9), CellValue::Empty);
        assert_eq!(sheet.get(3, 4, ReadMode::Computed), CellValue::Empty);
        assert!(sheet.is_stale(3, 4));
        assert!(!sheet.is_stale(1, 4));
    }

    #[test]
    fn test_stale_cells_respect_bounds() {
        let sheet = sheet();
        assert_eq!(sheet.stale_cells(&ScanBounds::new(1, 1, 10, 10)), vec![Coordinate::new("Estimate", 3, 4)]);
        assert!(sheet.stale_cells(&ScanBounds::new(1, 1, 2, 10)).is_empty());
    }

    #[test]
    fn test_reads_do_not_mutate() {
        let sheet = sheet();
        let first = sheet.cell(2, 2);
        let second = sheet.cell(2, 2);
        assert_eq!(first, second);
        assert_eq!(first, CellValue::Literal(Scalar::Number(450.0)));
    }
}
