//! The host grid the optimizer drives.
//!
//! The host owns the only durable state. Everything the optimizer does goes through
//! this trait: cell reads, formula/value writes, the recompute barrier and the few
//! sheet-level operations the cache lifecycle needs.

use std::fmt;

use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, CellValue, Column, RowRange};

/// A host call, named for error reporting and failure injection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOperation {
    Read,
    WriteFormula,
    WriteValue,
    Recompute,
    CreateSheet,
    DeleteSheet,
    HideSheet,
    ShowSheet,
    ProtectSheet,
}

impl HostOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            HostOperation::Read => "read",
            HostOperation::WriteFormula => "write-formula",
            HostOperation::WriteValue => "write-value",
            HostOperation::Recompute => "recompute",
            HostOperation::CreateSheet => "create-sheet",
            HostOperation::DeleteSheet => "delete-sheet",
            HostOperation::HideSheet => "hide-sheet",
            HostOperation::ShowSheet => "show-sheet",
            HostOperation::ProtectSheet => "protect-sheet",
        }
    }
}

impl fmt::Display for HostOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed host call. Propagated unchanged; the optimizer never retries.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("host {operation} failed: {message}")]
pub struct HostError {
    pub operation: HostOperation,
    pub message: String,
}

impl HostError {
    pub fn new(operation: HostOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Value and formula of one cell, read together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellRead {
    pub value: CellValue,
    /// Display-form formula text (`=SUM(...)`), empty for constants and blanks.
    pub formula: String,
}

/// Grid operations the optimizer requires.
///
/// # Contract
///
/// [`Host::recompute_and_wait`] must not return until every formula reflects every
/// write issued before it. Validation compares values read after the barrier; if the
/// host returns early those comparisons are meaningless.
///
/// No other writer may touch the monitored cells between a "before" capture and its
/// paired "after" capture. This is assumed, not enforced; concurrent edits show up as
/// false-positive mismatches.
pub trait Host {
    fn sheet_exists(&self, name: &str) -> bool;

    fn read_cell(&self, sheet: &str, cell: CellAddress) -> Result<CellRead, HostError>;

    /// Values of `column` across `rows`, top to bottom.
    fn read_column(
        &self,
        sheet: &str,
        column: Column,
        rows: RowRange,
    ) -> Result<Vec<CellValue>, HostError> {
        rows.iter()
            .map(|row| self.read_cell(sheet, column.at(row)).map(|read| read.value))
            .collect()
    }

    fn write_formula(&mut self, sheet: &str, cell: CellAddress, formula: &str)
        -> Result<(), HostError>;

    fn write_value(&mut self, sheet: &str, cell: CellAddress, value: CellValue)
        -> Result<(), HostError>;

    /// Blocking recompute barrier.
    fn recompute_and_wait(&mut self) -> Result<(), HostError>;

    fn create_sheet(&mut self, name: &str) -> Result<(), HostError>;

    fn delete_sheet(&mut self, name: &str) -> Result<(), HostError>;

    fn hide_sheet(&mut self, name: &str) -> Result<(), HostError>;

    fn show_sheet(&mut self, name: &str) -> Result<(), HostError>;

    fn is_sheet_hidden(&self, name: &str) -> Result<bool, HostError>;

    /// Protect a sheet against edits, warning-only, with a user-visible description.
    fn protect_sheet(&mut self, name: &str, description: &str) -> Result<(), HostError>;
}
