use sheet_model::{CellValue, Column, RowRange};

use crate::compare::{values_match, MismatchRecord, FULL_COLUMN_TOLERANCE};
use crate::host::{Host, HostError};

/// Exhaustive check of one column over every row of `rows`.
///
/// Reads the column fresh from the host and compares it position by position
/// against `before` (captured over the same rows) with [`FULL_COLUMN_TOLERANCE`].
/// Rows missing on either side compare as blank. An empty result means the
/// rewrite is safe to keep.
pub fn validate_column<H: Host + ?Sized>(
    host: &H,
    sheet: &str,
    column: Column,
    rows: RowRange,
    before: &[CellValue],
) -> Result<Vec<MismatchRecord>, HostError> {
    let after = host.read_column(sheet, column, rows)?;
    Ok(diff_column(column, rows, before, &after))
}

pub(crate) fn diff_column(
    column: Column,
    rows: RowRange,
    before: &[CellValue],
    after: &[CellValue],
) -> Vec<MismatchRecord> {
    let blank = CellValue::Empty;
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let b = before.get(i).unwrap_or(&blank);
            let a = after.get(i).unwrap_or(&blank);
            (!values_match(b, a, FULL_COLUMN_TOLERANCE)).then(|| MismatchRecord {
                address: column.at(row),
                before: b.clone(),
                after: a.clone(),
            })
        })
        .collect()
}
