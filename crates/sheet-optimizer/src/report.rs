//! Structured results of a run, renderable as text or JSON.

use std::fmt;

use serde::{Deserialize, Serialize};
use sheet_model::CellAddress;

use crate::compare::{MismatchRecord, ValidationResult};
use crate::error::Result;
use crate::steps::StepKind;

/// Coordinator state of one step.
///
/// `Pending → DryRun | Applying → Verifying → Committed | RolledBack → Done`.
/// Reports record the last state before `Done`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepState {
    Pending,
    DryRun,
    Applying,
    Verifying,
    Committed,
    RolledBack,
    Done,
}

impl StepState {
    pub fn as_str(self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::DryRun => "dry-run",
            StepState::Applying => "applying",
            StepState::Verifying => "verifying",
            StepState::Committed => "committed",
            StepState::RolledBack => "rolled-back",
            StepState::Done => "done",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum WriteOutcome {
    /// Dry-run: would have been written.
    Previewed,
    /// New formula equals the current one; nothing written.
    Unchanged,
    Committed,
    /// Written, failed verification, prior formula restored.
    RolledBack { mismatches: usize },
    Skipped { reason: String },
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Previewed => f.write_str("previewed"),
            WriteOutcome::Unchanged => f.write_str("unchanged"),
            WriteOutcome::Committed => f.write_str("committed"),
            WriteOutcome::RolledBack { mismatches } => {
                write!(f, "rolled back ({mismatches} mismatch(es))")
            }
            WriteOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// One target cell of a step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    pub sheet: String,
    pub cell: CellAddress,
    /// Formula before the step.
    pub before: String,
    /// Formula the step wanted (equal to `before` for skipped cells).
    pub after: String,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: StepKind,
    pub state: StepState,
    pub writes: Vec<WriteReport>,
    /// Full-column mismatches behind any rollback, in detection order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<MismatchRecord>,
}

impl StepReport {
    pub fn new(step: StepKind) -> Self {
        Self {
            step,
            state: StepState::Pending,
            writes: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    /// Cells that were (or in dry-run would be) written.
    pub fn cells_touched(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| {
                matches!(
                    w.outcome,
                    WriteOutcome::Previewed
                        | WriteOutcome::Committed
                        | WriteOutcome::RolledBack { .. }
                )
            })
            .count()
    }

    pub fn rolled_back(&self) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w.outcome, WriteOutcome::RolledBack { .. }))
    }
}

/// Aggregate result of [`crate::Coordinator::run_all`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub dry_run: bool,
    /// An abort was requested and later steps were not invoked.
    pub aborted: bool,
    pub steps: Vec<StepReport>,
    /// Run-level sampled comparison. `None` for dry-runs.
    pub final_check: Option<ValidationResult>,
}

impl RunReport {
    /// True unless the final sampled check found a mismatch.
    pub fn passed(&self) -> bool {
        self.final_check.as_ref().map_or(true, |check| check.passed)
    }

    /// Formulas a dry-run would write, in step order.
    pub fn planned_formulas(&self) -> Vec<&WriteReport> {
        self.steps
            .iter()
            .flat_map(|step| &step.writes)
            .filter(|w| w.outcome == WriteOutcome::Previewed)
            .collect()
    }

    pub fn ensure_passed(&self) -> Result<()> {
        match &self.final_check {
            Some(check) => check.ensure_passed("final sampled check"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "optimization run ({})",
            if self.dry_run { "dry-run" } else { "applied" }
        )?;
        for step in &self.steps {
            writeln!(
                f,
                "[{}] {}: {} cell(s)",
                step.step,
                step.state,
                step.cells_touched()
            )?;
            for w in &step.writes {
                if w.before == w.after {
                    writeln!(f, "  {}!{}  {}", w.sheet, w.cell, w.outcome)?;
                } else {
                    writeln!(
                        f,
                        "  {}!{}  {} -> {}  {}",
                        w.sheet, w.cell, w.before, w.after, w.outcome
                    )?;
                }
            }
            for m in &step.mismatches {
                writeln!(f, "  mismatch {}: {} -> {}", m.address, m.before, m.after)?;
            }
        }
        if self.aborted {
            writeln!(f, "aborted before all steps ran")?;
        }
        match &self.final_check {
            None => writeln!(f, "final check: skipped"),
            Some(check) if check.passed => writeln!(
                f,
                "final check: passed ({} cells compared)",
                check.total_compared
            ),
            Some(check) => {
                writeln!(
                    f,
                    "final check: FAILED ({} of {} cells differ)",
                    check.mismatches.len(),
                    check.total_compared
                )?;
                for m in &check.mismatches {
                    writeln!(f, "  {}: {} -> {}", m.address, m.before, m.after)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheet_model::CellValue;

    fn write(cell: &str, outcome: WriteOutcome) -> WriteReport {
        WriteReport {
            sheet: "2026-02".to_string(),
            cell: CellAddress::from_a1(cell).unwrap(),
            before: "=SUM(S5:S)".to_string(),
            after: "=SUM(S5:S169)".to_string(),
            outcome,
        }
    }

    #[test]
    fn counts_and_rollback_flag() {
        let mut step = StepReport::new(StepKind::Simplification);
        step.writes.push(write("AE5", WriteOutcome::RolledBack { mismatches: 1 }));
        step.writes.push(write("AG5", WriteOutcome::Committed));
        step.writes.push(write(
            "AH5",
            WriteOutcome::Skipped {
                reason: "no formula".to_string(),
            },
        ));
        assert_eq!(step.cells_touched(), 2);
        assert!(step.rolled_back());
    }

    #[test]
    fn failed_final_check_is_reported() {
        let mismatch = MismatchRecord {
            address: CellAddress::from_a1("S2").unwrap(),
            before: CellValue::Number(10.0),
            after: CellValue::Number(11.0),
        };
        let report = RunReport {
            dry_run: false,
            aborted: false,
            steps: Vec::new(),
            final_check: Some(ValidationResult::new(14, vec![mismatch])),
        };
        assert!(!report.passed());
        assert!(report.ensure_passed().is_err());
        let text = report.to_string();
        assert!(text.contains("final check: FAILED (1 of 14 cells differ)"));
        assert!(text.contains("S2: 10 -> 11"));
    }

    #[test]
    fn dry_run_preview_lists_previewed_writes_only() {
        let mut step = StepReport::new(StepKind::Closure);
        step.state = StepState::DryRun;
        step.writes.push(write("S2", WriteOutcome::Previewed));
        step.writes.push(write("T2", WriteOutcome::Unchanged));
        let report = RunReport {
            dry_run: true,
            aborted: false,
            steps: vec![step],
            final_check: None,
        };
        assert!(report.passed());
        let planned = report.planned_formulas();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].cell.to_a1(), "S2");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["steps"][0]["writes"][0]["outcome"], "previewed");
    }
}
