//! Comma-separated text via the `csv` crate.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use sheetdrop_shared::{Result, SheetdropError};
use tracing::debug;

use crate::Cell;

/// Data records below the CSV header line.
#[derive(Debug)]
pub(crate) struct RowGrid {
    rows: Vec<StringRecord>,
}

/// Read data records up to and including `max_row`.
///
/// Records past the deepest row the layout needs are never parsed.
pub(crate) fn read_rows(path: &Path, max_row: Option<usize>) -> Result<RowGrid> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| SheetdropError::extraction(format!("cannot open {}: {e}", path.display())))?;

    let wanted = max_row.map_or(0, |row| row.saturating_add(1));
    let mut rows = Vec::with_capacity(wanted.min(1024));
    for record in reader.records().take(wanted) {
        let record = record.map_err(|e| {
            SheetdropError::extraction(format!("malformed CSV in {}: {e}", path.display()))
        })?;
        rows.push(record);
    }

    debug!(rows = rows.len(), "csv rows loaded");
    Ok(RowGrid { rows })
}

impl RowGrid {
    pub(crate) fn cell(&self, row: usize, col: usize) -> Option<Cell<'_>> {
        let value = self.rows.get(row)?.get(col)?;
        if value.trim().is_empty() {
            Some(Cell::Empty)
        } else {
            Some(Cell::Text(value))
        }
    }
}
