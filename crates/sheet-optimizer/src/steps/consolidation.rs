use log::info;
use sheet_model::{column_range, open_column_range, quote_sheet_name, Column};

use super::{data_span, Planned, PlannedWrite, RewriteStep, StepKind};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::host::Host;

/// Replaces per-cell master lookups with one shared lookup on the cache sheet.
#[derive(Copy, Clone, Debug, Default)]
pub struct Consolidation;

impl RewriteStep for Consolidation {
    fn kind(&self) -> StepKind {
        StepKind::Consolidation
    }

    fn required_sheets<'a>(&self, config: &'a OptimizerConfig) -> Vec<&'a str> {
        vec![config.target_sheet.as_str(), config.master_sheet.as_str()]
    }

    fn prepare(&self, host: &mut dyn Host, config: &OptimizerConfig) -> Result<()> {
        if !host.sheet_exists(&config.cache_sheet) {
            host.create_sheet(&config.cache_sheet)?;
            info!("[{}] created cache sheet {}", self.kind(), config.cache_sheet);
        }
        Ok(())
    }

    fn plan(&self, _host: &dyn Host, config: &OptimizerConfig) -> Result<Vec<Planned>> {
        let target = config.target_sheet.as_str();
        let cache = quote_sheet_name(&config.cache_sheet);
        let start = config.data_rows.start;

        let mut out = Vec::with_capacity(config.consolidation.mappings.len() + 2);
        out.push(Planned::Write(
            PlannedWrite::new(
                config.cache_sheet.as_str(),
                Column::A.at(start),
                cache_formula(config),
                "shared master lookup",
            )
            .with_barrier(),
        ));

        for mapping in &config.consolidation.mappings {
            let formula = format!(
                "=ArrayFormula({cache}!{})",
                column_range(mapping.cache_column, config.data_rows)
            );
            out.push(Planned::Write(PlannedWrite::new(
                target,
                mapping.target_cell,
                formula,
                mapping.description.as_str(),
            )));
        }

        out.push(Planned::Write(PlannedWrite::new(
            target,
            config.consolidation.channel_cell,
            channel_formula(config, &cache),
            "channel branch",
        )));
        Ok(out)
    }
}

/// The array lookup placed at the top of the cache sheet.
///
/// Keys are the target sheet's name column joined with its code column; the master
/// side joins its name column with the code zero-padded to seven digits.
pub fn cache_formula(config: &OptimizerConfig) -> String {
    let target = quote_sheet_name(&config.target_sheet);
    let master = quote_sheet_name(&config.master_sheet);
    let c = &config.consolidation;
    let first = c.master_first_row;
    let (name_key, code_key) = c.key_columns;
    let (master_name, master_code) = c.master_key_columns;
    let (value_first, value_last) = c.master_value_columns;

    format!(
        "=ArrayFormula(IFERROR(XLOOKUP(\
         {target}!{}&{target}!{},\
         {master}!{}&TEXT({master}!{},\"0000000\"),\
         {master}!{value_first}{first}:{value_last})))",
        data_span(config, name_key),
        data_span(config, code_key),
        open_column_range(master_name, first),
        open_column_range(master_code, first),
    )
}

fn channel_formula(config: &OptimizerConfig, cache: &str) -> String {
    let ch = &config.consolidation.channel_columns;
    let span = |column: Column| format!("{cache}!{}", data_span(config, column));
    format!(
        "=ArrayFormula(LET(\
         g,{},\
         ig,{},yt,{},tw,{},tiktok,{},other,{},\
         IFS(\
         (g=\"\")+(g=0),ig,\
         g=2,other,\
         REGEXMATCH(LOWER(g),\"instagram\"),ig,\
         REGEXMATCH(LOWER(g),\"youtube\"),yt,\
         REGEXMATCH(LOWER(g),\"twitter\"),tw,\
         REGEXMATCH(LOWER(g),\"tiktok\"),tiktok,\
         TRUE,other)))",
        data_span(config, config.consolidation.channel_column),
        span(ch.instagram),
        span(ch.youtube),
        span(ch.twitter),
        span(ch.tiktok),
        span(ch.other),
    )
}
