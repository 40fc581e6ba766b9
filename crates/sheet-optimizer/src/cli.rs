use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;

use rand::rngs::StdRng;
use rand::SeedableRng as _;

use crate::{
    compare_load_tests, run_load_test, CacheSheetManager, Coordinator, LoadTestResult,
    MemoryHost, MemoryWorkbook, OptimizerConfig, RunReport,
};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(about = "Rewrite worksheet formulas in place, verifying that computed values do not change.")]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the default configuration as JSON.
    DefaultConfig,

    /// Show the formulas a run would write, without changing anything.
    Preview {
        /// Configuration JSON (missing fields take their defaults).
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        /// Workbook dump JSON.
        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Apply every step to a workbook dump and write the result.
    ///
    /// Exits with status 1 when the final sampled check finds a difference.
    Apply {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        /// Where to write the rewritten workbook dump.
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Seed for row sampling (random when omitted).
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Time recompute barriers under synthetic writes and save the result.
    ///
    /// Overwritten cells are restored unless `loadTest.restoreValues` is false;
    /// the workbook file itself is never modified.
    LoadTest {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        /// Sheet to write into (defaults to the configured target sheet).
        #[arg(long)]
        sheet: Option<String>,

        /// Seed for row selection (random when omitted).
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the result JSON.
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Print a before/after table for two saved load-test results.
    CompareLoadTests {
        before: PathBuf,
        after: PathBuf,
    },

    /// Manage the lookup cache sheet in a workbook dump.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Create the cache sheet with its lookup formula, reusing an existing one.
    Create {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Hide and protect the cache sheet.
    Protect {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Delete the cache sheet. A missing sheet is reported, not an error.
    Delete {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,

        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Check the cache lookup column holds data. Exits with status 1 when invalid.
    Validate {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "PATH")]
        workbook: PathBuf,
    },
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::DefaultConfig => {
            let json = serde_json::to_string_pretty(&OptimizerConfig::default())?;
            emit(&json)
        }
        Command::Preview {
            config,
            workbook,
            format,
        } => {
            let config: OptimizerConfig = read_json(&config, "config")?;
            let workbook: MemoryWorkbook = read_json(&workbook, "workbook")?;
            let mut coordinator = Coordinator::new(MemoryHost::new(workbook), config);
            let report = coordinator.run_all(true)?;
            print_report(&report, &format)
        }
        Command::Apply {
            config,
            workbook,
            output,
            seed,
            format,
        } => {
            let config: OptimizerConfig = read_json(&config, "config")?;
            let workbook: MemoryWorkbook = read_json(&workbook, "workbook")?;
            let host = MemoryHost::new(workbook);
            let mut coordinator = match seed {
                Some(seed) => Coordinator::with_seed(host, config, seed),
                None => Coordinator::new(host, config),
            };
            let report = coordinator.run_all(false)?;

            let rewritten = coordinator.into_host().into_workbook();
            write_json(&output, &rewritten, "workbook")?;

            print_report(&report, &format)?;
            if !report.passed() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::LoadTest {
            config,
            workbook,
            sheet,
            seed,
            output,
        } => {
            let config: OptimizerConfig = read_json(&config, "config")?;
            let workbook: MemoryWorkbook = read_json(&workbook, "workbook")?;
            let sheet = sheet.unwrap_or_else(|| config.target_sheet.clone());
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let mut host = MemoryHost::new(workbook);
            let result = run_load_test(&mut host, &sheet, &config, &mut rng)?;

            write_json(&output, &result, "load-test result")?;
            let stats = &result.stats;
            emit(&format!(
                "{}: {} round(s), mean {:.1}ms, median {:.1}ms, min {:.1}ms, max {:.1}ms, \
                 {} cell(s) restored",
                result.sheet_name,
                result.rounds.len(),
                stats.mean,
                stats.median,
                stats.min,
                stats.max,
                result.cells_restored
            ))
        }
        Command::CompareLoadTests { before, after } => {
            let before: LoadTestResult = read_json(&before, "load-test result")?;
            let after: LoadTestResult = read_json(&after, "load-test result")?;
            emit(&compare_load_tests(&before, &after).to_string())
        }
        Command::Cache { action } => run_cache(action),
    }
}

fn run_cache(action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Create {
            config,
            workbook,
            output,
        } => {
            let (config, mut host) = read_inputs(&config, &workbook)?;
            let created = CacheSheetManager::new(&mut host, &config).create()?;
            write_json(&output, host.workbook(), "workbook")?;
            if created {
                emit(&format!("created cache sheet {}", config.cache_sheet))
            } else {
                emit(&format!("cache sheet {} already exists", config.cache_sheet))
            }
        }
        CacheAction::Protect {
            config,
            workbook,
            output,
        } => {
            let (config, mut host) = read_inputs(&config, &workbook)?;
            CacheSheetManager::new(&mut host, &config).protect()?;
            write_json(&output, host.workbook(), "workbook")?;
            emit(&format!("protected cache sheet {}", config.cache_sheet))
        }
        CacheAction::Delete {
            config,
            workbook,
            output,
        } => {
            let (config, mut host) = read_inputs(&config, &workbook)?;
            let deleted = CacheSheetManager::new(&mut host, &config).delete()?;
            write_json(&output, host.workbook(), "workbook")?;
            if deleted {
                emit(&format!("deleted cache sheet {}", config.cache_sheet))
            } else {
                emit(&format!("no cache sheet {} to delete", config.cache_sheet))
            }
        }
        CacheAction::Validate { config, workbook } => {
            let (config, mut host) = read_inputs(&config, &workbook)?;
            let check = CacheSheetManager::new(&mut host, &config).validate()?;
            emit(&serde_json::to_string_pretty(&check)?)?;
            if !check.valid {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn read_inputs(config: &Path, workbook: &Path) -> Result<(OptimizerConfig, MemoryHost)> {
    let config: OptimizerConfig = read_json(config, "config")?;
    let workbook: MemoryWorkbook = read_json(workbook, "workbook")?;
    Ok((config, MemoryHost::new(workbook)))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read {what} {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {what} {}", path.display()))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("write {what} {}", path.display()))
}

fn print_report(report: &RunReport, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => emit(&report.to_string()),
        OutputFormat::Json => emit(&serde_json::to_string_pretty(report)?),
    }
}

/// Write to stdout, treating a closed pipe as success.
fn emit(text: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match write_text(&mut handle, text) {
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("write to stdout"),
    }
}

fn write_text(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}
