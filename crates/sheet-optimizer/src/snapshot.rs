use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, CellValue};

use crate::host::{Host, HostError};
use crate::sampling::{RowSample, SamplingPlan};

/// Value and formula of one cell at capture time. Immutable once taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub address: CellAddress,
    pub value: CellValue,
    pub formula: String,
}

/// Capture every cell `plan` names for the concrete row set `rows`.
///
/// Pure read: summary cells first, then each sampled row across the detail columns.
/// Two snapshots meant to be compared must be taken with the same `rows`.
pub fn take_snapshot<H: Host + ?Sized>(
    host: &H,
    sheet: &str,
    plan: &SamplingPlan,
    rows: &RowSample,
) -> Result<Vec<CellSnapshot>, HostError> {
    plan.addresses(rows)
        .into_iter()
        .map(|address| {
            let read = host.read_cell(sheet, address)?;
            Ok(CellSnapshot {
                address,
                value: read.value,
                formula: read.formula,
            })
        })
        .collect()
}
