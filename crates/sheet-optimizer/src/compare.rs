//! Type-aware value equality and the sampled before/after comparator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, CellValue};

use crate::error::OptimizerError;
use crate::snapshot::CellSnapshot;

/// Absolute tolerance of the sampled comparator. Absorbs recomputation noise.
pub const SAMPLED_TOLERANCE: f64 = 0.01;

/// Absolute tolerance of the full-column validator.
pub const FULL_COLUMN_TOLERANCE: f64 = 0.001;

/// Equality rule shared by both comparators, applied in order:
/// 1. both blank → equal
/// 2. both numeric → equal iff `|before - after| <= tolerance`
/// 3. otherwise → equal iff the textual forms are identical
pub fn values_match(before: &CellValue, after: &CellValue, tolerance: f64) -> bool {
    if before.is_blank() && after.is_blank() {
        return true;
    }
    if let (Some(b), Some(a)) = (before.as_number(), after.as_number()) {
        return (b - a).abs() <= tolerance;
    }
    before.to_text() == after.to_text()
}

/// A cell whose value diverged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub address: CellAddress,
    pub before: CellValue,
    pub after: CellValue,
}

/// Outcome of a comparison. `passed` holds iff `mismatches` is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub passed: bool,
    pub total_compared: usize,
    pub mismatches: Vec<MismatchRecord>,
}

impl ValidationResult {
    pub fn new(total_compared: usize, mismatches: Vec<MismatchRecord>) -> Self {
        Self {
            passed: mismatches.is_empty(),
            total_compared,
            mismatches,
        }
    }

    /// Turn a failed comparison into [`OptimizerError::ValidationMismatch`].
    pub fn ensure_passed(&self, context: &str) -> Result<(), OptimizerError> {
        if self.passed {
            return Ok(());
        }
        Err(OptimizerError::ValidationMismatch {
            context: context.to_string(),
            mismatches: self.mismatches.len(),
        })
    }
}

/// Compare two snapshots keyed by address, with [`SAMPLED_TOLERANCE`].
///
/// `before` entries with no `after` counterpart are skipped and not counted.
/// Mismatches are reported in `before` order.
pub fn compare_snapshots(before: &[CellSnapshot], after: &[CellSnapshot]) -> ValidationResult {
    let after_by_address: HashMap<CellAddress, &CellSnapshot> =
        after.iter().map(|s| (s.address, s)).collect();

    let mut total_compared = 0usize;
    let mut mismatches = Vec::new();
    for b in before {
        let Some(a) = after_by_address.get(&b.address) else {
            continue;
        };
        total_compared += 1;
        if !values_match(&b.value, &a.value, SAMPLED_TOLERANCE) {
            mismatches.push(MismatchRecord {
                address: b.address,
                before: b.value.clone(),
                after: a.value.clone(),
            });
        }
    }

    ValidationResult::new(total_compared, mismatches)
}
