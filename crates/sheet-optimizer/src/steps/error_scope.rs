use sheet_model::area_range;

use super::{Planned, PlannedWrite, RewriteStep, StepKind};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

/// Restricts the sheet's error counter to the header row and the lookup-bearing
/// column spans, instead of the whole sheet.
#[derive(Copy, Clone, Debug, Default)]
pub struct ErrorScope;

impl RewriteStep for ErrorScope {
    fn kind(&self) -> StepKind {
        StepKind::ErrorScope
    }

    fn plan(&self, _host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let scope = &config.error_scope;
        let mut formula = format!("=SUMPRODUCT(ISERROR({})*1)", scope.header_range);
        for span in &scope.spans {
            formula.push_str(&format!(
                "+SUMPRODUCT(ISERROR({})*1)",
                area_range(span.first, span.last, config.data_rows)
            ));
        }
        Ok(vec![Planned::Write(PlannedWrite::new(
            config.target_sheet.as_str(),
            scope.cell,
            formula,
            "error count over lookup columns",
        ))])
    }
}
