use super::{data_span, Planned, PlannedWrite, PostCondition, RewriteStep, StepKind};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

/// Collapses the withholding-tax expressions to `ROUNDUP(src*1.08/1.1)`.
///
/// This is the one behavior-changing rewrite: each target carries a full-column
/// post-condition on its own column and is verified and rolled back on its own.
#[derive(Copy, Clone, Debug, Default)]
pub struct Simplification;

impl RewriteStep for Simplification {
    fn kind(&self) -> StepKind {
        StepKind::Simplification
    }

    fn plan(&self, _host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let target = config.target_sheet.as_str();
        Ok(config
            .simplification
            .targets
            .iter()
            .map(|tax| {
                let formula = format!(
                    "=ArrayFormula(ROUNDUP({}*1.08/1.1))",
                    data_span(config, tax.source_column)
                );
                Planned::Write(
                    PlannedWrite::new(
                        target,
                        tax.cell,
                        formula,
                        format!("withholding tax from {}", tax.source_column),
                    )
                    .verified_by(PostCondition::FullColumn {
                        column: tax.cell.column,
                    }),
                )
            })
            .collect())
    }
}
