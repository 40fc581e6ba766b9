//! Validated in-place formula rewriting for a large monthly worksheet.
//!
//! The optimizer never evaluates formulas. It establishes equivalence empirically:
//! capture a sample of cells, rewrite, let the host recompute, capture again and
//! compare within tolerance. The one behavior-changing rewrite (tax simplification)
//! is additionally checked row by row over its whole column and rolled back on its
//! own if any row moves.
//!
//! Entry points:
//! - [`Coordinator`]: runs the six rewrite steps against a [`Host`]
//! - [`CacheSheetManager`]: creates, protects, validates and tears down the cache sheet
//! - [`run_load_test`] / [`compare_load_tests`]: recalculation latency before and after
//!
//! [`MemoryHost`] implements [`Host`] over an in-memory workbook for tests and for
//! operating on JSON workbook dumps.

mod cache;
pub mod cli;
mod compare;
mod config;
mod coordinator;
mod error;
mod host;
mod memory;
mod report;
mod sampling;
mod snapshot;
pub mod steps;
mod validate;

pub use cache::{CacheSheetManager, CacheValidation, CACHE_PROTECTION_DESCRIPTION};
pub use compare::{
    compare_snapshots, values_match, MismatchRecord, ValidationResult, FULL_COLUMN_TOLERANCE,
    SAMPLED_TOLERANCE,
};
pub use config::{
    CacheMapping, CachingConfig, ChannelColumns, ClosureConfig, ColumnSpan, ConsolidationConfig,
    ConversionLookup, ErrorScopeConfig, KeyUnificationConfig, LoadTestConfig, OptimizerConfig,
    SimplificationConfig, TaxTarget, ValidationConfig,
};
pub use coordinator::{AbortHandle, Coordinator};
pub use error::{OptimizerError, Result};
pub use host::{CellRead, Host, HostError, HostOperation};
pub use load_test::{
    compare_load_tests, run_load_test, LoadTestComparison, LoadTestResult, LoadTestRound,
    LoadTestStats, PercentChange, StatComparison,
};
pub use memory::{MemoryCell, MemoryHost, MemorySheet, MemoryWorkbook};
pub use report::{RunReport, StepReport, StepState, WriteOutcome, WriteReport};
pub use sampling::{RowSample, SamplingPlan};
pub use snapshot::{take_snapshot, CellSnapshot};
pub use steps::{PostCondition, StepKind};
pub use validate::validate_column;
