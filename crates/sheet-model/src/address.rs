use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum rows per worksheet (1,048,576).
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum columns per worksheet (16,384, i.e. `XFD`).
pub const MAX_COLUMNS: u32 = 16_384;

/// Errors produced while parsing or building cell coordinates.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("empty column letters")]
    EmptyColumn,
    #[error("invalid column letters '{0}'")]
    InvalidColumn(String),
    #[error("column index {0} is out of range (1..=16384)")]
    ColumnOutOfRange(u32),
    #[error("empty cell reference")]
    EmptyReference,
    #[error("missing row in cell reference '{0}'")]
    MissingRow(String),
    #[error("invalid row in cell reference '{0}'")]
    InvalidRow(String),
    #[error("row range {start}..={end} is empty or out of bounds")]
    InvalidRowRange { start: u32, end: u32 },
}

/// Convert base-26 column letters (`A` = 1, `Z` = 26, `AA` = 27) into a 1-based index.
///
/// Lowercase letters are accepted and normalized: `index_to_column` always returns
/// uppercase, so `"ab"` comes back as `"AB"`.
pub fn column_to_index(letters: &str) -> Result<u32, AddressError> {
    if letters.is_empty() {
        return Err(AddressError::EmptyColumn);
    }

    let mut index: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(AddressError::InvalidColumn(letters.to_string()));
        }
        let digit = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        index = index
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| AddressError::InvalidColumn(letters.to_string()))?;
    }

    if index > MAX_COLUMNS {
        return Err(AddressError::ColumnOutOfRange(index));
    }
    Ok(index)
}

/// Convert a 1-based column index back into its letters.
pub fn index_to_column(index: u32) -> Result<String, AddressError> {
    Column::from_index(index).map(Column::letters)
}

/// A worksheet column, stored as its 1-based index.
///
/// Serializes as its letters (`"AE"`), which is how columns appear in configuration files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column(u32);

impl Column {
    pub const A: Column = Column(1);

    pub fn from_index(index: u32) -> Result<Self, AddressError> {
        if index == 0 || index > MAX_COLUMNS {
            return Err(AddressError::ColumnOutOfRange(index));
        }
        Ok(Self(index))
    }

    pub fn from_letters(letters: &str) -> Result<Self, AddressError> {
        column_to_index(letters).map(Self)
    }

    /// 1-based column index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    pub fn letters(self) -> String {
        let mut n = self.0;
        let mut out = Vec::<u8>::with_capacity(3);
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        out.reverse();
        out.into_iter().map(char::from).collect()
    }

    /// The cell in this column at `row`.
    #[inline]
    pub const fn at(self, row: u32) -> CellAddress {
        CellAddress { row, column: self }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

impl FromStr for Column {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_letters(s.trim())
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.letters())
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single cell within a named sheet, in A1 terms.
///
/// Rows are 1-based like the grid the user sees. Ordering is row-major so sorted
/// collections of addresses read top to bottom, left to right.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// 1-based row.
    pub row: u32,
    pub column: Column,
}

impl CellAddress {
    pub fn new(column: Column, row: u32) -> Result<Self, AddressError> {
        if row == 0 || row > MAX_ROWS {
            return Err(AddressError::InvalidRow(format!("{column}{row}")));
        }
        Ok(Self { row, column })
    }

    /// Parse an A1 reference such as `S2` or `$AE$5`.
    pub fn from_a1(a1: &str) -> Result<Self, AddressError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(AddressError::EmptyReference);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(AddressError::InvalidColumn(s.to_string()));
        }
        let column = Column::from_letters(&s[col_start..idx])?;

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(AddressError::MissingRow(s.to_string()));
        }
        if idx != bytes.len() {
            return Err(AddressError::InvalidRow(s.to_string()));
        }

        let row: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| AddressError::InvalidRow(s.to_string()))?;
        Self::new(column, row)
    }

    pub fn to_a1(self) -> String {
        format!("{}{}", self.column, self.row)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

impl FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_a1(s)
    }
}

impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1())
    }
}

impl<'de> Deserialize<'de> for CellAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An inclusive, 1-based span of rows (`start..=end`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRange {
    pub start: u32,
    pub end: u32,
}

impl RowRange {
    pub fn new(start: u32, end: u32) -> Result<Self, AddressError> {
        let range = Self { start, end };
        range.check()?;
        Ok(range)
    }

    /// Validate a range that was built field-by-field (e.g. deserialized).
    pub fn check(&self) -> Result<(), AddressError> {
        if self.start == 0 || self.start > self.end || self.end > MAX_ROWS {
            return Err(AddressError::InvalidRowRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Number of rows in the range.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false for a checked range; present for clippy's `len_without_is_empty`.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Integer-floor middle row.
    #[inline]
    pub const fn middle(&self) -> u32 {
        self.start + (self.end - self.start) / 2
    }

    #[inline]
    pub const fn contains(&self, row: u32) -> bool {
        row >= self.start && row <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// `S5:S169` style range over a single column.
pub fn column_range(column: Column, rows: RowRange) -> String {
    format!("{column}{}:{column}{}", rows.start, rows.end)
}

/// `H5:I169` style range spanning several columns.
pub fn area_range(first: Column, last: Column, rows: RowRange) -> String {
    format!("{first}{}:{last}{}", rows.start, rows.end)
}

/// `S5:S` style range with no upper row bound.
pub fn open_column_range(column: Column, start_row: u32) -> String {
    format!("{column}{start_row}:{column}")
}
