//! Run configuration.
//!
//! One [`OptimizerConfig`] value is passed explicitly to every component. The
//! defaults describe the monthly worksheet layout the rewrite templates were
//! written for: data rows 5..=169, a summary row at 2 and a sub-section block at
//! 170..=200.

use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, Column, RowRange};

use crate::error::{OptimizerError, Result};
use crate::sampling::SamplingPlan;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerConfig {
    /// Worksheet being optimized (changes every month).
    pub target_sheet: String,
    /// Inclusive data rows.
    pub data_rows: RowRange,
    /// Inclusive rows of the aggregation block below the data.
    pub sub_section_rows: RowRange,
    pub master_sheet: String,
    /// Sheet created by consolidation to hold the shared lookup results.
    pub cache_sheet: String,
    /// Sheet mapping agent codes to names, used by key unification.
    pub lookup_list_sheet: String,
    /// Conversion-results sheet, keyed by the unified lookup key.
    pub conversion_sheet: String,
    pub closure: ClosureConfig,
    pub consolidation: ConsolidationConfig,
    pub key_unification: KeyUnificationConfig,
    pub caching: CachingConfig,
    pub simplification: SimplificationConfig,
    pub error_scope: ErrorScopeConfig,
    pub validation: ValidationConfig,
    pub load_test: LoadTestConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target_sheet: "2026-02".to_string(),
            data_rows: RowRange { start: 5, end: 169 },
            sub_section_rows: RowRange {
                start: 170,
                end: 200,
            },
            master_sheet: "Master".to_string(),
            cache_sheet: "_cache_master_lookup".to_string(),
            lookup_list_sheet: "List".to_string(),
            conversion_sheet: "CV".to_string(),
            closure: ClosureConfig::default(),
            consolidation: ConsolidationConfig::default(),
            key_unification: KeyUnificationConfig::default(),
            caching: CachingConfig::default(),
            simplification: SimplificationConfig::default(),
            error_scope: ErrorScopeConfig::default(),
            validation: ValidationConfig::default(),
            load_test: LoadTestConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Reject values that cannot produce a valid rewrite plan.
    pub fn validate(&self) -> Result<()> {
        for (label, rows) in [
            ("dataRows", self.data_rows),
            ("subSectionRows", self.sub_section_rows),
        ] {
            rows.check()
                .map_err(|err| OptimizerError::InvalidConfig(format!("{label}: {err}")))?;
        }

        for (label, name) in [
            ("targetSheet", &self.target_sheet),
            ("masterSheet", &self.master_sheet),
            ("cacheSheet", &self.cache_sheet),
            ("lookupListSheet", &self.lookup_list_sheet),
            ("conversionSheet", &self.conversion_sheet),
        ] {
            if name.trim().is_empty() {
                return Err(OptimizerError::InvalidConfig(format!(
                    "{label} must not be empty"
                )));
            }
        }

        if self.cache_sheet == self.target_sheet {
            return Err(OptimizerError::InvalidConfig(
                "cacheSheet must differ from targetSheet".to_string(),
            ));
        }

        self.consolidation.validate()?;

        self.load_test.validate()
    }

    /// Sampling plan for the whole-run before/after check.
    pub fn sampling_plan(&self) -> SamplingPlan {
        SamplingPlan {
            summary_cells: self.validation.summary_cells.clone(),
            detail_columns: self.validation.detail_columns.clone(),
            rows: self.data_rows,
            random_rows: self.validation.random_rows,
        }
    }
}

/// Range closure targets: summary cells holding a single `SUM` over a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClosureConfig {
    /// Bounded at the last data row.
    pub data_range_cells: Vec<CellAddress>,
    /// Bounded at the last sub-section row.
    pub sub_range_cells: Vec<CellAddress>,
    /// Already closed by hand; reported and left alone.
    pub closed_cells: Vec<CellAddress>,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            data_range_cells: cells(&["S2", "T2", "Z2", "AA2", "AH2", "AI2"]),
            sub_range_cells: cells(&["AJ2", "AL2", "AN2", "AP2", "BE2", "BF2"]),
            closed_cells: cells(&["BO2"]),
        }
    }
}

/// A target cell redirected to a column of the cache sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMapping {
    pub cache_column: Column,
    pub target_cell: CellAddress,
    /// Master column the cache column mirrors.
    pub master_column: Column,
    pub description: String,
}

/// Cache columns used by the channel branch formula, one per channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelColumns {
    pub instagram: Column,
    pub youtube: Column,
    pub twitter: Column,
    pub tiktok: Column,
    /// Fallback when no channel matches.
    pub other: Column,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsolidationConfig {
    /// Target-sheet columns concatenated into the lookup key.
    pub key_columns: (Column, Column),
    /// Master columns: name key and numeric code (zero-padded to seven digits).
    pub master_key_columns: (Column, Column),
    /// First and last master columns pulled into the cache.
    pub master_value_columns: (Column, Column),
    /// First master data row (row 1 holds headers).
    pub master_first_row: u32,
    pub mappings: Vec<CacheMapping>,
    pub channel_cell: CellAddress,
    /// Target-sheet column holding the channel name.
    pub channel_column: Column,
    pub channel_columns: ChannelColumns,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        let mapping = |cache: &str, target: &str, master: &str, description: &str| CacheMapping {
            cache_column: col(cache),
            target_cell: cell(target),
            master_column: col(master),
            description: description.to_string(),
        };
        Self {
            key_columns: (col("E"), col("BB")),
            master_key_columns: (col("B"), col("R")),
            master_value_columns: (col("C"), col("S")),
            master_first_row: 2,
            mappings: vec![
                mapping("A", "H5", "C", "partner name"),
                mapping("G", "AB5", "I", "payment category"),
                mapping("H", "AC5", "J", "payment terms"),
                mapping("I", "AR5", "K", "review flag 1"),
                mapping("J", "AT5", "L", "review flag 2"),
                mapping("K", "AW5", "M", "review flag 3"),
                mapping("L", "AX5", "N", "review flag 4"),
                mapping("M", "AY5", "O", "bank name"),
                mapping("N", "AZ5", "P", "branch name"),
                mapping("O", "BA5", "Q", "account type"),
                mapping("Q", "BC5", "S", "account number"),
            ],
            channel_cell: cell("I5"),
            channel_column: col("G"),
            channel_columns: ChannelColumns {
                instagram: col("B"),
                youtube: col("C"),
                twitter: col("D"),
                tiktok: col("E"),
                other: col("F"),
            },
        }
    }
}

impl ConsolidationConfig {
    /// Each mapping's cache column must be the cache's copy of its master column:
    /// the cache starts at column A with the first pulled master column.
    fn validate(&self) -> Result<()> {
        let (first, last) = self.master_value_columns;
        if first > last {
            return Err(OptimizerError::InvalidConfig(format!(
                "consolidation.masterValueColumns: {first} comes after {last}"
            )));
        }
        for mapping in &self.mappings {
            let expected = (mapping.master_column >= first && mapping.master_column <= last)
                .then(|| mapping.master_column.index() - first.index() + 1);
            if expected != Some(mapping.cache_column.index()) {
                return Err(OptimizerError::InvalidConfig(format!(
                    "consolidation mapping for {}: cache column {} does not mirror master column {} \
                     (cache holds master {first}..={last})",
                    mapping.target_cell, mapping.cache_column, mapping.master_column
                )));
            }
        }
        Ok(())
    }
}

/// A cell pulling one column of the conversion sheet through the unified key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionLookup {
    pub target_cell: CellAddress,
    pub conversion_column: Column,
    /// Manual override column: when non-blank it wins over the lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_column: Option<Column>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyUnificationConfig {
    /// Column receiving the unified key (array formula anchored at the first data row).
    pub key_column: Column,
    /// Cell holding the month date used for the `YYMM` prefix.
    pub month_cell: CellAddress,
    /// Key column on the conversion sheet.
    pub conversion_key_column: Column,
    /// List sheet columns: agent code and agent name.
    pub agent_columns: (Column, Column),
    pub lookups: Vec<ConversionLookup>,
}

impl Default for KeyUnificationConfig {
    fn default() -> Self {
        Self {
            key_column: col("BQ"),
            month_cell: cell("B2"),
            conversion_key_column: col("A"),
            agent_columns: (col("F"), col("E")),
            lookups: vec![
                ConversionLookup {
                    target_cell: cell("U5"),
                    conversion_column: col("F"),
                    override_column: None,
                },
                ConversionLookup {
                    target_cell: cell("V5"),
                    conversion_column: col("G"),
                    override_column: None,
                },
                ConversionLookup {
                    target_cell: cell("W5"),
                    conversion_column: col("H"),
                    override_column: Some(col("X")),
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachingConfig {
    pub profit_cell: CellAddress,
    pub confirmed_sales_cell: CellAddress,
    pub confirmed_profit_cell: CellAddress,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            profit_cell: cell("T5"),
            confirmed_sales_cell: cell("Z5"),
            confirmed_profit_cell: cell("AA5"),
        }
    }
}

/// A withholding-tax array formula and the column it is computed from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxTarget {
    /// Anchor cell of the array formula; its column is validated in full.
    pub cell: CellAddress,
    pub source_column: Column,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplificationConfig {
    pub targets: Vec<TaxTarget>,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                TaxTarget {
                    cell: cell("AE5"),
                    source_column: col("AD"),
                },
                TaxTarget {
                    cell: cell("AG5"),
                    source_column: col("AF"),
                },
            ],
        }
    }
}

/// Inclusive column span, e.g. `H..=I`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub first: Column,
    pub last: Column,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorScopeConfig {
    pub cell: CellAddress,
    /// Header row range always included (`B3:BD3`).
    pub header_range: String,
    /// Lookup-bearing column spans counted over the data rows.
    pub spans: Vec<ColumnSpan>,
}

impl Default for ErrorScopeConfig {
    fn default() -> Self {
        let span = |first: &str, last: &str| ColumnSpan {
            first: col(first),
            last: col(last),
        };
        Self {
            cell: cell("N2"),
            header_range: "B3:BD3".to_string(),
            spans: vec![span("H", "I"), span("U", "W"), span("AB", "AC")],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Summary-row cells always captured.
    pub summary_cells: Vec<CellAddress>,
    pub detail_columns: Vec<Column>,
    /// Random rows added on top of the first, middle and last data rows.
    pub random_rows: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            summary_cells: cells(&[
                "S2", "T2", "Z2", "AA2", "AH2", "AI2", "AJ2", "AL2", "AN2", "AP2", "BE2", "BF2",
                "BO2", "N2",
            ]),
            detail_columns: [
                "H", "I", "S", "T", "U", "V", "W", "Z", "AA", "AE", "AG", "AH", "BF",
            ]
            .into_iter()
            .map(col)
            .collect(),
            random_rows: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTestConfig {
    pub rounds: u32,
    pub writes_per_round: u32,
    /// Column written with synthetic values to trigger recomputation.
    pub probe_column: Column,
    pub cool_down_ms: u64,
    /// Write saved values back after each round.
    pub restore_values: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            writes_per_round: 3,
            probe_column: col("F"),
            cool_down_ms: 500,
            restore_values: true,
        }
    }
}

impl LoadTestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(OptimizerError::InvalidConfig(
                "loadTest.rounds must be at least 1".to_string(),
            ));
        }
        if self.writes_per_round == 0 {
            return Err(OptimizerError::InvalidConfig(
                "loadTest.writesPerRound must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Default layouts are static A1 literals; a typo trips the debug assertion in tests.
fn col(letters: &str) -> Column {
    let parsed = Column::from_letters(letters);
    debug_assert!(parsed.is_ok(), "bad default column literal {letters:?}");
    parsed.unwrap_or(Column::A)
}

fn cell(a1: &str) -> CellAddress {
    let parsed = CellAddress::from_a1(a1);
    debug_assert!(parsed.is_ok(), "bad default cell literal {a1:?}");
    parsed.unwrap_or(Column::A.at(1))
}

fn cells(a1: &[&str]) -> Vec<CellAddress> {
    a1.iter().map(|s| cell(s)).collect()
}
