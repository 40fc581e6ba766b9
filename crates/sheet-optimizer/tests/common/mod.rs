#![allow(dead_code)]

use sheet_model::{classify_sum, CellAddress, CellValue, Column, SumForm};
use sheet_optimizer::{MemorySheet, MemoryWorkbook, OptimizerConfig};

pub fn a1(s: &str) -> CellAddress {
    CellAddress::from_a1(s).expect("valid A1")
}

pub fn col(s: &str) -> Column {
    Column::from_letters(s).expect("valid column")
}

/// Workbook holding every sheet the default configuration requires.
pub fn workbook(config: &OptimizerConfig) -> MemoryWorkbook {
    let mut wb = MemoryWorkbook::new();
    for name in [
        &config.target_sheet,
        &config.master_sheet,
        &config.lookup_list_sheet,
        &config.conversion_sheet,
    ] {
        wb.add_sheet(name.clone());
    }
    wb
}

/// Fill `column` over `rows` with `value(row)`.
pub fn fill(
    sheet: &mut MemorySheet,
    column: &str,
    rows: std::ops::RangeInclusive<u32>,
    value: impl Fn(u32) -> f64,
) {
    let column = col(column);
    for row in rows {
        sheet.set_value(column.at(row), value(row));
    }
}

/// Recompute every single-range `SUM` formula on `sheet_name`.
///
/// Open ranges run to the last populated row of their column.
pub fn recompute_sums(wb: &mut MemoryWorkbook, sheet_name: &str) {
    let Some(sheet) = wb.sheet_mut(sheet_name) else {
        return;
    };

    let mut updates = Vec::new();
    for (addr, cell) in &sheet.cells {
        let (column, start, end) = match classify_sum(&cell.formula) {
            SumForm::Open {
                start_column,
                start_row,
                ..
            } => (start_column, start_row, u32::MAX),
            SumForm::Closed {
                start_column,
                start_row,
                end_row,
                ..
            } => (start_column, start_row, end_row),
            SumForm::Unrecognized => continue,
        };
        let total: f64 = sheet
            .cells
            .iter()
            .filter(|(a, _)| a.column == column && a.row >= start && a.row <= end)
            .filter_map(|(_, c)| c.value.as_number())
            .sum();
        updates.push((*addr, total));
    }

    for (addr, total) in updates {
        sheet.set_computed(addr, CellValue::Number(total));
    }
}
