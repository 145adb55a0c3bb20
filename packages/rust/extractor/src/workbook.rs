//! `.xlsx` sheets via calamine.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use sheetdrop_shared::{Result, SheetdropError};
use tracing::debug;

use crate::Cell;

/// The used range of one worksheet. Row 0 of the range is the header.
///
/// Columns are addressed from column A even when the used range starts
/// further right, so blank leading columns keep their positions.
#[derive(Debug)]
pub(crate) struct SheetGrid {
    range: Range<Data>,
}

/// Open `path` and load the worksheet named `sheet`.
pub(crate) fn open_sheet(path: &Path, sheet: &str) -> Result<SheetGrid> {
    let mut book: Xlsx<BufReader<File>> = open_workbook(path).map_err(|e| {
        SheetdropError::extraction(format!("cannot open workbook {}: {e}", path.display()))
    })?;

    let names = book.sheet_names();
    if !names.iter().any(|name| name == sheet) {
        return Err(SheetdropError::extraction(format!(
            "sheet {sheet:?} not found (workbook has {names:?})"
        )));
    }

    let range = book
        .worksheet_range(sheet)
        .map_err(|e| SheetdropError::extraction(format!("cannot read sheet {sheet:?}: {e}")))?;

    debug!(
        sheet,
        start = ?range.start(),
        height = range.height(),
        width = range.width(),
        "worksheet loaded"
    );
    Ok(SheetGrid { range })
}

impl SheetGrid {
    /// Data cell `(row, col)` below the header row, `col` counted from column A.
    pub(crate) fn cell(&self, row: usize, col: usize) -> Option<Cell<'_>> {
        let row = row.checked_add(1)?;
        if row >= self.range.height() {
            return None;
        }
        let first_col = self.range.start().map_or(0, |(_, c)| c as usize);
        let Some(col) = col.checked_sub(first_col) else {
            return Some(Cell::Empty);
        };
        let data = self.range.get((row, col))?;
        Some(match data {
            Data::Int(n) => Cell::Int(*n),
            Data::Float(f) => Cell::Float(*f),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s),
            Data::Empty => Cell::Empty,
            Data::Bool(_) => Cell::Other("boolean"),
            Data::Error(_) => Cell::Other("formula error"),
            _ => Cell::Other("date"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    use crate::test_support::write_workbook;

    #[test]
    fn header_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path(), "Overall Quad", &[("first", 7.0), ("second", 8.0)]);

        let grid = open_sheet(&path, "Overall Quad").unwrap();
        assert_eq!(grid.cell(0, 0), Some(Cell::Text("first")));
        assert_eq!(grid.cell(0, 1), Some(Cell::Float(7.0)));
        assert_eq!(grid.cell(1, 1), Some(Cell::Float(8.0)));
        assert_eq!(grid.cell(2, 1), None);
    }

    #[test]
    fn columns_count_from_column_a() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");
        let mut workbook = Workbook::new();
        {
            // Header at C3, so data cell (0, 3) is D4.
            let ws = workbook.add_worksheet();
            ws.set_name("Overall Quad").unwrap();
            ws.write_string(2, 2, "Type").unwrap();
            ws.write_string(2, 3, "Count").unwrap();
            ws.write_string(3, 2, "a").unwrap();
            ws.write_number(3, 3, 12.0).unwrap();
        }
        workbook.save(&path).unwrap();

        let grid = open_sheet(&path, "Overall Quad").unwrap();
        assert_eq!(grid.cell(0, 3), Some(Cell::Float(12.0)));
        assert_eq!(grid.cell(0, 2), Some(Cell::Text("a")));
        assert_eq!(grid.cell(0, 1), Some(Cell::Empty));
        assert_eq!(grid.cell(1, 1), None);
    }

    #[test]
    fn blank_column_a_keeps_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank_a.xlsx");
        let mut workbook = Workbook::new();
        {
            let ws = workbook.add_worksheet();
            ws.set_name("Overall Quad").unwrap();
            ws.write_string(0, 1, "Count").unwrap();
            ws.write_number(1, 1, 9.0).unwrap();
        }
        workbook.save(&path).unwrap();

        let grid = open_sheet(&path, "Overall Quad").unwrap();
        assert_eq!(grid.cell(0, 1), Some(Cell::Float(9.0)));
        assert_eq!(grid.cell(0, 0), Some(Cell::Empty));
    }

    #[test]
    fn typed_non_numeric_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.xlsx");
        let mut workbook = Workbook::new();
        {
            let ws = workbook.add_worksheet();
            ws.set_name("Overall Quad").unwrap();
            ws.write_string(0, 0, "Flag").unwrap();
            ws.write_boolean(1, 0, true).unwrap();
        }
        workbook.save(&path).unwrap();

        let grid = open_sheet(&path, "Overall Quad").unwrap();
        assert_eq!(grid.cell(0, 0), Some(Cell::Other("boolean")));
    }
}
