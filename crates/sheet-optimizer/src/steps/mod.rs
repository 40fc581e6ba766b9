//! The six rewrite steps.
//!
//! A step turns configuration (and, for closure, the formulas currently on the
//! sheet) into a list of planned writes. Steps never mutate the host themselves
//! apart from [`RewriteStep::prepare`]; the coordinator applies, verifies and rolls
//! back.

use std::fmt;

use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, Column};

use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

mod caching;
mod closure;
mod consolidation;
mod error_scope;
mod key_unification;
mod simplification;

pub use caching::Caching;
pub use closure::Closure;
pub use consolidation::{cache_formula, Consolidation};
pub use error_scope::ErrorScope;
pub use key_unification::KeyUnification;
pub use simplification::Simplification;

/// Step identity. The declaration order is the execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Closure,
    Consolidation,
    KeyUnification,
    Caching,
    Simplification,
    ErrorScope,
}

impl StepKind {
    pub const ALL: [StepKind; 6] = [
        StepKind::Closure,
        StepKind::Consolidation,
        StepKind::KeyUnification,
        StepKind::Caching,
        StepKind::Simplification,
        StepKind::ErrorScope,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Closure => "closure",
            StepKind::Consolidation => "consolidation",
            StepKind::KeyUnification => "key-unification",
            StepKind::Caching => "caching",
            StepKind::Simplification => "simplification",
            StepKind::ErrorScope => "error-scope",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What must hold after a write for it to be kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PostCondition {
    /// Covered by the run-level sampled check only.
    None,
    /// Every data row of `column` must keep its value within the full-column tolerance.
    FullColumn { column: Column },
}

/// One formula a step wants written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWrite {
    pub sheet: String,
    pub cell: CellAddress,
    pub formula: String,
    /// Short operator-facing description.
    pub note: String,
    pub post_condition: PostCondition,
    /// Issue a recompute barrier right after this write.
    pub barrier_after: bool,
}

impl PlannedWrite {
    pub fn new(
        sheet: impl Into<String>,
        cell: CellAddress,
        formula: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            cell,
            formula: formula.into(),
            note: note.into(),
            post_condition: PostCondition::None,
            barrier_after: false,
        }
    }

    pub fn verified_by(mut self, post_condition: PostCondition) -> Self {
        self.post_condition = post_condition;
        self
    }

    pub fn with_barrier(mut self) -> Self {
        self.barrier_after = true;
        self
    }
}

/// A cell a step looked at and decided not to touch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedCell {
    pub sheet: String,
    pub cell: CellAddress,
    pub reason: String,
}

/// One entry of a step plan, in the order the step produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum Planned {
    Write(PlannedWrite),
    Skip(SkippedCell),
}

/// A unit of rewriting work.
pub trait RewriteStep {
    fn kind(&self) -> StepKind;

    /// Sheets that must exist before anything in the run is mutated.
    fn required_sheets<'a>(&self, config: &'a OptimizerConfig) -> Vec<&'a str> {
        vec![config.target_sheet.as_str()]
    }

    /// Host setup needed before the planned writes can land. Not called in dry-run.
    fn prepare(&self, _host: &mut dyn Host, _config: &OptimizerConfig) -> Result<()> {
        Ok(())
    }

    /// Formulas to write, in application order. May read the host; must not write.
    fn plan(&self, host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>>;
}

/// Every step, in execution order.
pub fn all_steps() -> Vec<Box<dyn RewriteStep>> {
    StepKind::ALL.into_iter().map(step_for).collect()
}

pub fn step_for(kind: StepKind) -> Box<dyn RewriteStep> {
    match kind {
        StepKind::Closure => Box::new(Closure),
        StepKind::Consolidation => Box::new(Consolidation),
        StepKind::KeyUnification => Box::new(KeyUnification),
        StepKind::Caching => Box::new(Caching),
        StepKind::Simplification => Box::new(Simplification),
        StepKind::ErrorScope => Box::new(ErrorScope),
    }
}

/// `S5:S169` style span over the configured data rows.
pub(crate) fn data_span(config: &OptimizerConfig, column: Column) -> String {
    sheet_model::column_range(column, config.data_rows)
}
