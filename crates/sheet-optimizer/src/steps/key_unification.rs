use sheet_model::quote_sheet_name;

use super::{data_span, Planned, PlannedWrite, RewriteStep, StepKind};
use crate::config::{ConversionLookup, OptimizerConfig};
use crate::error::Result;
use crate::host::Host;

/// Builds the conversion lookup key once in its own column and points the
/// conversion lookups at it.
#[derive(Copy, Clone, Debug, Default)]
pub struct KeyUnification;

impl RewriteStep for KeyUnification {
    fn kind(&self) -> StepKind {
        StepKind::KeyUnification
    }

    fn required_sheets<'a>(&self, config: &'a OptimizerConfig) -> Vec<&'a str> {
        vec![
            config.target_sheet.as_str(),
            config.lookup_list_sheet.as_str(),
            config.conversion_sheet.as_str(),
        ]
    }

    fn plan(&self, _host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let target = config.target_sheet.as_str();
        let ku = &config.key_unification;

        let mut out = Vec::with_capacity(ku.lookups.len() + 1);
        out.push(Planned::Write(PlannedWrite::new(
            target,
            ku.key_column.at(config.data_rows.start),
            key_formula(config),
            "unified lookup key",
        )));
        for lookup in &ku.lookups {
            out.push(Planned::Write(PlannedWrite::new(
                target,
                lookup.target_cell,
                lookup_formula(config, lookup),
                lookup_note(lookup),
            )));
        }
        Ok(out)
    }
}

/// `YYMM` of the month cell, then the M/L columns, the agent name looked up from
/// the code embedded in column B, and column F.
fn key_formula(config: &OptimizerConfig) -> String {
    let ku = &config.key_unification;
    let list = quote_sheet_name(&config.lookup_list_sheet);
    let (code, name) = ku.agent_columns;
    let (s, e) = (config.data_rows.start, config.data_rows.end);
    format!(
        "=ArrayFormula(LET(\
         ym,TEXT({month},\"YYMM\"),\
         agent,XLOOKUP(MID(B{s}:B{e},5,10),{list}!{code}:{code},{list}!{name}:{name}),\
         ym&M{s}:M{e}&L{s}:L{e}&agent&F{s}:F{e}))",
        month = ku.month_cell,
    )
}

fn lookup_note(lookup: &ConversionLookup) -> String {
    match lookup.override_column {
        Some(manual) => format!(
            "conversion {} with override from {manual}",
            lookup.conversion_column
        ),
        None => format!("conversion {}", lookup.conversion_column),
    }
}

fn lookup_formula(config: &OptimizerConfig, lookup: &ConversionLookup) -> String {
    let ku = &config.key_unification;
    let cv = quote_sheet_name(&config.conversion_sheet);
    let key = ku.conversion_key_column;
    let value = lookup.conversion_column;
    let xlookup = format!(
        "IFERROR(XLOOKUP({},{cv}!{key}:{key},{cv}!{value}:{value}))",
        data_span(config, ku.key_column)
    );
    match lookup.override_column {
        None => format!("=ArrayFormula({xlookup})"),
        Some(manual) => format!(
            "=ArrayFormula(LET(cv,{xlookup},x,{},IF(x<>\"\",x,cv)))",
            data_span(config, manual)
        ),
    }
}
