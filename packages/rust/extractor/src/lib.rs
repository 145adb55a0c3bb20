//! Cell extraction from downloaded spreadsheets.
//!
//! [`extract`] reads the cells named by an [`ExtractLayout`] out of a
//! [`RawFile`] and returns them as a [`ResultRecord`] in layout order.
//!
//! Coordinates are relative to the header row: the first row of the sheet's
//! used range (or the CSV header line) is the header, `row` counts data rows
//! beneath it and `col` counts from the first used column. Both are zero-based.

mod delimited;
mod workbook;

use sheetdrop_shared::{
    ExtractLayout, FieldSpec, FieldValue, FormatTag, RawFile, Result, ResultRecord, SheetdropError,
};
use tracing::{debug, instrument};

/// One cell as seen by the extractor, independent of the file format.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell<'a> {
    Float(f64),
    Int(i64),
    Text(&'a str),
    Empty,
    /// A typed cell that never holds a count (bool, date, formula error).
    Other(&'static str),
}

/// Extract the layout's fields from `raw`.
///
/// Fails with [`SheetdropError::UnsupportedFormat`] for formats without a
/// parser, and [`SheetdropError::Extraction`] when the sheet, a cell, or a
/// numeric value is missing.
#[instrument(skip_all, fields(identity = %raw.identity, format = %raw.format))]
pub fn extract(raw: &RawFile, layout: &ExtractLayout) -> Result<ResultRecord> {
    let record = match &raw.format {
        FormatTag::Workbook => {
            let grid = workbook::open_sheet(&raw.path, &layout.sheet)?;
            read_fields(layout, |row, col| grid.cell(row, col))?
        }
        FormatTag::DelimitedText => {
            let grid = delimited::read_rows(&raw.path, layout.max_row())?;
            read_fields(layout, |row, col| grid.cell(row, col))?
        }
        FormatTag::Other(tag) => return Err(SheetdropError::unsupported_format(tag.clone())),
    };

    debug!(fields = record.len(), "fields extracted");
    Ok(record)
}

fn read_fields<'g, F>(layout: &ExtractLayout, cell: F) -> Result<ResultRecord>
where
    F: Fn(usize, usize) -> Option<Cell<'g>>,
{
    let mut record = ResultRecord::new();
    for field in &layout.fields {
        let value = cell(field.row, field.col).unwrap_or(Cell::Empty);
        let count = to_count(field, &value)?;
        record.insert(field.name.clone(), FieldValue::Integer(count));
    }
    Ok(record)
}

/// Convert a cell to an integer count, rounding half to even.
fn to_count(field: &FieldSpec, cell: &Cell<'_>) -> Result<i64> {
    let number = match cell {
        Cell::Int(n) => return Ok(*n),
        Cell::Float(f) => *f,
        Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            SheetdropError::extraction(format!(
                "{}: cell ({}, {}) is not numeric: {s:?}",
                field.name, field.row, field.col
            ))
        })?,
        Cell::Empty => {
            return Err(SheetdropError::extraction(format!(
                "{}: cell ({}, {}) is missing or empty",
                field.name, field.row, field.col
            )));
        }
        Cell::Other(kind) => {
            return Err(SheetdropError::extraction(format!(
                "{}: cell ({}, {}) holds a {kind}, not a number",
                field.name, field.row, field.col
            )));
        }
    };

    round_count(number).ok_or_else(|| {
        SheetdropError::extraction(format!(
            "{}: cell ({}, {}) value {number} does not fit an integer count",
            field.name, field.row, field.col
        ))
    })
}

/// `42.5 -> 42`, `43.5 -> 44`. `None` for NaN, infinities and out-of-range values.
pub(crate) fn round_count(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    // i64::MAX as f64 is 2^63, one past the largest i64.
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}
