use sheet_model::AddressError;

use crate::host::HostError;

/// Errors surfaced by optimization and load-test runs.
///
/// A step whose rewrite diverged is rolled back and reported, not returned as an
/// error; [`OptimizerError::ValidationMismatch`] is only produced when a caller asks
/// for a failed check to be treated as fatal (see [`crate::RunReport::ensure_passed`]).
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("sheet '{sheet}' not found")]
    MissingSheet { sheet: String },
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("{context}: {mismatches} cell(s) diverged beyond tolerance")]
    ValidationMismatch { context: String, mismatches: usize },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub(crate) fn missing_sheet(sheet: impl Into<String>) -> OptimizerError {
    OptimizerError::MissingSheet {
        sheet: sheet.into(),
    }
}

pub type Result<T, E = OptimizerError> = std::result::Result<T, E>;
