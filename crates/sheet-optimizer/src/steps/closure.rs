use sheet_model::{classify_sum, CellAddress, SumForm};

use super::{Planned, PlannedWrite, RewriteStep, SkippedCell, StepKind};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

/// Bounds open-ended `SUM(S5:S)` summary formulas at a fixed end row.
#[derive(Copy, Clone, Debug, Default)]
pub struct Closure;

impl RewriteStep for Closure {
    fn kind(&self) -> StepKind {
        StepKind::Closure
    }

    fn plan(&self, host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let sheet = config.target_sheet.as_str();
        let closure = &config.closure;
        let targets = closure
            .data_range_cells
            .iter()
            .map(|cell| (*cell, config.data_rows.end))
            .chain(
                closure
                    .sub_range_cells
                    .iter()
                    .map(|cell| (*cell, config.sub_section_rows.end)),
            );

        let mut out = Vec::new();
        for (cell, end_row) in targets {
            let current = host.read_cell(sheet, cell)?.formula;
            out.push(close_cell(sheet, cell, &current, end_row));
        }
        for cell in &closure.closed_cells {
            out.push(skip(sheet, *cell, "closed by hand"));
        }
        Ok(out)
    }
}

fn close_cell(sheet: &str, cell: CellAddress, current: &str, end_row: u32) -> Planned {
    if current.trim().is_empty() {
        return skip(sheet, cell, "no formula");
    }

    let form = classify_sum(current);
    let formula = match form {
        SumForm::Closed { end_row: existing, .. } if existing == end_row => current.to_string(),
        SumForm::Open { .. } | SumForm::Closed { .. } => match form.closed_at(end_row) {
            Some(formula) => formula,
            None => return skip(sheet, cell, "not a single-range SUM"),
        },
        SumForm::Unrecognized => return skip(sheet, cell, "not a single-range SUM"),
    };

    let note = match form {
        SumForm::Open { .. } => format!("close open range at row {end_row}"),
        _ => format!("move range end to row {end_row}"),
    };
    Planned::Write(PlannedWrite::new(sheet, cell, formula, note))
}

fn skip(sheet: &str, cell: CellAddress, reason: &str) -> Planned {
    Planned::Skip(SkippedCell {
        sheet: sheet.to_string(),
        cell,
        reason: reason.to_string(),
    })
}
