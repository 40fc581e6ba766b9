use super::{Planned, PlannedWrite, RewriteStep, StepKind};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

/// Deal-type label marking commission-based rows in column BG.
const COMMISSION_LABEL: &str = "成果";
/// Deal-type label in column D for flat budget/bonus rows.
const BUDGET_LABEL: &str = "予算/ボーナス";

/// Rewrites the profit and confirmed-amount columns so every referenced range is
/// bound once with `LET` instead of being repeated inside the expression.
#[derive(Copy, Clone, Debug, Default)]
pub struct Caching;

impl RewriteStep for Caching {
    fn kind(&self) -> StepKind {
        StepKind::Caching
    }

    fn plan(&self, _host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let target = config.target_sheet.as_str();
        let (s, e) = (config.data_rows.start, config.data_rows.end);
        let c = &config.caching;

        let profit = format!(
            "=ArrayFormula(LET(\
             s,S{s}:S{e},r,R{s}:R{e},af,AF{s}:AF{e},bf,BF{s}:BF{e},bg,BG{s}:BG{e},\
             IF(bg=\"{COMMISSION_LABEL}\",s-(r*af),s-bf)))"
        );
        let confirmed_sales = format!(
            "=ArrayFormula(LET(\
             q,Q{s}:Q{e},d,D{s}:D{e},n,N{s}:N{e},x,X{s}:X{e},\
             IF(q=TRUE,IF(d=\"{BUDGET_LABEL}\",n,n*x),0)))"
        );
        let confirmed_profit = format!(
            "=ArrayFormula(LET(\
             q,Q{s}:Q{e},z,Z{s}:Z{e},bf,BF{s}:BF{e},\
             IF(q=TRUE,z-bf,z)))"
        );

        Ok(vec![
            Planned::Write(PlannedWrite::new(target, c.profit_cell, profit, "profit")),
            Planned::Write(PlannedWrite::new(
                target,
                c.confirmed_sales_cell,
                confirmed_sales,
                "confirmed sales",
            )),
            Planned::Write(PlannedWrite::new(
                target,
                c.confirmed_profit_cell,
                confirmed_profit,
                "confirmed profit",
            )),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHost, MemoryWorkbook};

    #[test]
    fn binds_each_range_once() {
        let config = OptimizerConfig::default();
        let host = MemoryHost::new(MemoryWorkbook::new());
        let plan = Caching.plan(&host, &config).unwrap();
        let writes: Vec<&PlannedWrite> = plan
            .iter()
            .filter_map(|p| match p {
                Planned::Write(w) => Some(w),
                Planned::Skip(_) => None,
            })
            .collect();

        let cells: Vec<String> = writes.iter().map(|w| w.cell.to_a1()).collect();
        assert_eq!(cells, vec!["T5", "Z5", "AA5"]);
        assert_eq!(
            writes[2].formula,
            "=ArrayFormula(LET(q,Q5:Q169,z,Z5:Z169,bf,BF5:BF169,IF(q=TRUE,z-bf,z)))"
        );
        assert!(writes[0]
            .formula
            .ends_with("IF(bg=\"成果\",s-(r*af),s-bf)))"));
    }
}
