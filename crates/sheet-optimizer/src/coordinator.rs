//! Applies rewrite steps against a host, verifying and rolling back as needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng as _;

use crate::compare::{compare_snapshots, MismatchRecord};
use crate::config::OptimizerConfig;
use crate::error::{missing_sheet, Result};
use crate::host::Host;
use crate::report::{RunReport, StepReport, StepState, WriteOutcome, WriteReport};
use crate::snapshot::take_snapshot;
use crate::steps::{
    all_steps, step_for, Planned, PlannedWrite, PostCondition, RewriteStep, StepKind,
};
use crate::validate::validate_column;

/// Cooperative abort flag, checked between steps only.
///
/// A step that has started applying always runs to commit or rollback.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the rewrite steps against one host with one configuration.
///
/// Owns the random source used for row sampling so runs can be reproduced with
/// [`Coordinator::with_seed`].
pub struct Coordinator<H> {
    host: H,
    config: OptimizerConfig,
    rng: StdRng,
}

impl<H: Host> Coordinator<H> {
    pub fn new(host: H, config: OptimizerConfig) -> Self {
        Self {
            host,
            config,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(host: H, config: OptimizerConfig, seed: u64) -> Self {
        Self {
            host,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run every step in order. See [`Coordinator::run_all_with`].
    pub fn run_all(&mut self, dry_run: bool) -> Result<RunReport> {
        self.run_all_with(dry_run, &AbortHandle::new())
    }

    /// Run every step in order, stopping early if `abort` is set between steps.
    ///
    /// A real run captures a sampled baseline before the first step and compares it
    /// with a second capture over the same rows after a final barrier. A dry-run only
    /// reads: no writes, no snapshots.
    ///
    /// Missing required sheets fail the run before anything is mutated. A step whose
    /// verification fails is rolled back and reported; the run continues.
    pub fn run_all_with(&mut self, dry_run: bool, abort: &AbortHandle) -> Result<RunReport> {
        self.config.validate()?;
        let steps = all_steps();
        self.check_sheets(&steps)?;

        let sheet = self.config.target_sheet.clone();
        info!(
            "optimizing {sheet} rows {} ({})",
            self.config.data_rows,
            if dry_run { "dry-run" } else { "apply" }
        );

        let baseline = if dry_run {
            None
        } else {
            let plan = self.config.sampling_plan();
            let rows = plan.sample_rows(&mut self.rng);
            let before = take_snapshot(&self.host, &sheet, &plan, &rows)?;
            info!("baseline captured: {} cells over {} rows", before.len(), rows.len());
            Some((plan, rows, before))
        };

        let mut report = RunReport {
            dry_run,
            aborted: false,
            steps: Vec::with_capacity(steps.len()),
            final_check: None,
        };
        for step in &steps {
            if abort.is_aborted() {
                warn!("abort requested; not starting {}", step.kind());
                report.aborted = true;
                break;
            }
            report.steps.push(self.execute(step.as_ref(), dry_run)?);
        }

        if let Some((plan, rows, before)) = baseline {
            self.host.recompute_and_wait()?;
            let after = take_snapshot(&self.host, &sheet, &plan, &rows)?;
            let check = compare_snapshots(&before, &after);
            if check.passed {
                info!("final check passed: {} cells compared", check.total_compared);
            } else {
                for m in &check.mismatches {
                    warn!("final check mismatch {}: {} -> {}", m.address, m.before, m.after);
                }
                warn!(
                    "final check failed: {} of {} cells differ",
                    check.mismatches.len(),
                    check.total_compared
                );
            }
            report.final_check = Some(check);
        }

        Ok(report)
    }

    /// Run a single step outside a full run. No run-level sampled check is made.
    pub fn run_step(&mut self, kind: StepKind, dry_run: bool) -> Result<StepReport> {
        self.config.validate()?;
        let step = step_for(kind);
        self.check_sheets(std::slice::from_ref(&step))?;
        self.execute(step.as_ref(), dry_run)
    }

    fn check_sheets(&self, steps: &[Box<dyn RewriteStep>]) -> Result<()> {
        for step in steps {
            for sheet in step.required_sheets(&self.config) {
                if !self.host.sheet_exists(sheet) {
                    return Err(missing_sheet(sheet));
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, step: &dyn RewriteStep, dry_run: bool) -> Result<StepReport> {
        let kind = step.kind();
        let mut report = StepReport::new(kind);

        if !dry_run {
            step.prepare(&mut self.host, &self.config)?;
        }
        let plan = step.plan(&self.host, &self.config)?;

        let entered = if dry_run {
            StepState::DryRun
        } else {
            StepState::Applying
        };
        debug!("[{kind}] {} -> {entered}", StepState::Pending);

        for item in plan {
            let written = match item {
                Planned::Skip(skip) => {
                    info!("[{kind}] {}: skipped ({})", skip.cell, skip.reason);
                    let current = self.current_formula(&skip.sheet, skip.cell)?;
                    WriteReport {
                        sheet: skip.sheet,
                        cell: skip.cell,
                        before: current.clone(),
                        after: current,
                        outcome: WriteOutcome::Skipped {
                            reason: skip.reason,
                        },
                    }
                }
                Planned::Write(write) => {
                    self.apply(kind, write, dry_run, &mut report.mismatches)?
                }
            };
            report.writes.push(written);
        }

        report.state = if dry_run {
            StepState::DryRun
        } else if report.rolled_back() {
            StepState::RolledBack
        } else {
            StepState::Committed
        };
        debug!("[{kind}] {} -> {}", report.state, StepState::Done);
        Ok(report)
    }

    fn apply(
        &mut self,
        kind: StepKind,
        write: PlannedWrite,
        dry_run: bool,
        mismatches: &mut Vec<MismatchRecord>,
    ) -> Result<WriteReport> {
        let before = self.current_formula(&write.sheet, write.cell)?;

        let outcome = if before == write.formula {
            debug!("[{kind}] {}: unchanged", write.cell);
            WriteOutcome::Unchanged
        } else {
            info!(
                "[{kind}] {}: {} -> {} ({})",
                write.cell, before, write.formula, write.note
            );
            if dry_run {
                WriteOutcome::Previewed
            } else {
                match write.post_condition {
                    PostCondition::None => {
                        self.host
                            .write_formula(&write.sheet, write.cell, &write.formula)?;
                        if write.barrier_after {
                            self.host.recompute_and_wait()?;
                        }
                        WriteOutcome::Committed
                    }
                    PostCondition::FullColumn { column } => {
                        self.apply_verified(kind, &write, column, &before, mismatches)?
                    }
                }
            }
        };

        Ok(WriteReport {
            sheet: write.sheet,
            cell: write.cell,
            before,
            after: write.formula,
            outcome,
        })
    }

    /// Write, recompute, validate every data row of `column`, and restore `prior`
    /// on any mismatch.
    fn apply_verified(
        &mut self,
        kind: StepKind,
        write: &PlannedWrite,
        column: sheet_model::Column,
        prior: &str,
        mismatches: &mut Vec<MismatchRecord>,
    ) -> Result<WriteOutcome> {
        let rows = self.config.data_rows;
        let before_values = self.host.read_column(&write.sheet, column, rows)?;

        self.host
            .write_formula(&write.sheet, write.cell, &write.formula)?;
        let found = match self.verify(kind, write, column, &before_values) {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    "[{kind}] {}: verification failed ({err}), restoring prior formula",
                    write.cell
                );
                self.restore_best_effort(kind, write, prior);
                return Err(err);
            }
        };
        if found.is_empty() {
            debug!(
                "[{kind}] {}: {} -> {}",
                write.cell,
                StepState::Verifying,
                StepState::Committed
            );
            return Ok(WriteOutcome::Committed);
        }

        for m in &found {
            warn!("[{kind}] {}: {} -> {}", m.address, m.before, m.after);
        }
        warn!(
            "[{kind}] {}: {} mismatch(es) in column {column}, restoring prior formula",
            write.cell,
            found.len()
        );
        self.host.write_formula(&write.sheet, write.cell, prior)?;
        self.host.recompute_and_wait()?;

        let count = found.len();
        mismatches.extend(found);
        Ok(WriteOutcome::RolledBack { mismatches: count })
    }

    fn verify(
        &mut self,
        kind: StepKind,
        write: &PlannedWrite,
        column: sheet_model::Column,
        before_values: &[sheet_model::CellValue],
    ) -> Result<Vec<MismatchRecord>> {
        self.host.recompute_and_wait()?;
        debug!(
            "[{kind}] {}: {} -> {}",
            write.cell,
            StepState::Applying,
            StepState::Verifying
        );
        let rows = self.config.data_rows;
        Ok(validate_column(&self.host, &write.sheet, column, rows, before_values)?)
    }

    /// Put `prior` back after a host failure. Failures here are logged; the caller
    /// returns the error that got us here.
    fn restore_best_effort(&mut self, kind: StepKind, write: &PlannedWrite, prior: &str) {
        if let Err(err) = self.host.write_formula(&write.sheet, write.cell, prior) {
            warn!("[{kind}] {}: could not restore prior formula: {err}", write.cell);
            return;
        }
        if let Err(err) = self.host.recompute_and_wait() {
            warn!("[{kind}] {}: recompute after restore failed: {err}", write.cell);
        }
    }

    /// Formula text currently in `cell`; empty when the sheet does not exist yet
    /// (a dry-run previewing writes to the cache sheet).
    fn current_formula(&self, sheet: &str, cell: sheet_model::CellAddress) -> Result<String> {
        if !self.host.sheet_exists(sheet) {
            return Ok(String::new());
        }
        Ok(self.host.read_cell(sheet, cell)?.formula)
    }
}

impl<H> std::fmt::Debug for Coordinator<H>
where
    H: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("host", &self.host)
            .field("target_sheet", &self.config.target_sheet)
            .finish_non_exhaustive()
    }
}
