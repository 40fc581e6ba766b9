//! `sheet-model` holds the small, dependency-light vocabulary shared by the optimizer:
//! - A1 addressing (column letters, cells, inclusive row ranges, range text)
//! - typed cell values as reported by a host grid
//! - formula-text helpers, including the `SUM` range grammar used by range closure

mod address;
mod formula_text;
mod value;

pub use address::{
    area_range, column_range, column_to_index, index_to_column, open_column_range, AddressError,
    CellAddress, Column, RowRange, MAX_COLUMNS, MAX_ROWS,
};
pub use formula_text::{classify_sum, quote_sheet_name, SumForm};
pub use value::CellValue;
