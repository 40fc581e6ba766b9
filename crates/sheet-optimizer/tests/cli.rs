use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use sheet_optimizer::{
    CacheValidation, LoadTestResult, LoadTestStats, MemoryWorkbook, OptimizerConfig, RunReport,
    CACHE_PROTECTION_DESCRIPTION,
};

mod common;

use common::{a1, workbook};

fn sheet_optimizer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sheet_optimizer"))
        .args(args)
        .output()
        .expect("run sheet_optimizer")
}

fn write_inputs(dir: &Path) -> (String, String) {
    let config = OptimizerConfig::default();
    let mut wb = workbook(&config);
    wb.sheet_mut(&config.target_sheet)
        .expect("target sheet")
        .set_formula(a1("S2"), "=SUM(S5:S)");

    let config_path = dir.join("config.json");
    let workbook_path = dir.join("workbook.json");
    // Missing fields take their defaults.
    fs::write(&config_path, "{}").expect("write config");
    fs::write(
        &workbook_path,
        serde_json::to_string(&wb).expect("serialize workbook"),
    )
    .expect("write workbook");

    (
        config_path.to_string_lossy().into_owned(),
        workbook_path.to_string_lossy().into_owned(),
    )
}

#[test]
fn default_config_is_valid_json() {
    let output = sheet_optimizer(&["default-config"]);
    assert!(output.status.success());

    let parsed: OptimizerConfig = serde_json::from_slice(&output.stdout).expect("config json");
    assert_eq!(parsed, OptimizerConfig::default());
}

#[test]
fn preview_reports_planned_formulas_and_leaves_input_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());
    let original = fs::read_to_string(&workbook).expect("read workbook");

    let output = sheet_optimizer(&[
        "preview",
        "--config",
        &config,
        "--workbook",
        &workbook,
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: RunReport = serde_json::from_slice(&output.stdout).expect("report json");
    assert!(report.dry_run);
    let s2 = report
        .planned_formulas()
        .into_iter()
        .find(|w| w.cell == a1("S2"))
        .expect("S2 planned");
    assert_eq!(s2.after, "=SUM(S5:S169)");
    assert_eq!(fs::read_to_string(&workbook).expect("read workbook"), original);
}

#[test]
fn preview_text_lists_steps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());

    let output = sheet_optimizer(&["preview", "--config", &config, "--workbook", &workbook]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("optimization run (dry-run)"), "{stdout}");
    assert!(stdout.contains("[closure] dry-run"), "{stdout}");
    assert!(stdout.contains("final check: skipped"), "{stdout}");
}

#[test]
fn apply_writes_the_rewritten_workbook() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());
    let output_path = dir.path().join("out.json");

    let output = sheet_optimizer(&[
        "apply",
        "--config",
        &config,
        "--workbook",
        &workbook,
        "--output",
        &output_path.to_string_lossy(),
        "--seed",
        "17",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("final check: passed"));

    let rewritten: MemoryWorkbook =
        serde_json::from_str(&fs::read_to_string(&output_path).expect("read output"))
            .expect("workbook json");
    let sheet = rewritten.sheet("2026-02").expect("target sheet");
    assert_eq!(sheet.formula(a1("S2")), "=SUM(S5:S169)");
    assert!(rewritten.sheet("_cache_master_lookup").is_some());
}

#[test]
fn missing_config_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, workbook) = write_inputs(dir.path());
    let missing = dir.path().join("nope.json");

    let output = sheet_optimizer(&[
        "preview",
        "--config",
        &missing.to_string_lossy(),
        "--workbook",
        &workbook,
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("read config"));
}

#[test]
fn compare_load_tests_prints_a_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = |sheet: &str, ms: f64| LoadTestResult {
        sheet_name: sheet.to_string(),
        started_at: chrono::Utc::now(),
        rounds: Vec::new(),
        stats: LoadTestStats::from_latencies(&[ms]).expect("latency"),
        cells_restored: 0,
    };
    let before = dir.path().join("before.json");
    let after = dir.path().join("after.json");
    fs::write(&before, serde_json::to_string(&result("2026-02", 80.0)).expect("json"))
        .expect("write before");
    fs::write(&after, serde_json::to_string(&result("2026-02", 20.0)).expect("json"))
        .expect("write after");

    let output = sheet_optimizer(&[
        "compare-load-tests",
        &before.to_string_lossy(),
        &after.to_string_lossy(),
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| Metric | Before | After | Change |"), "{stdout}");
    assert!(stdout.contains("| Mean | 80.0ms | 20.0ms | -75.0% |"), "{stdout}");
    assert!(stdout.contains("| Std dev | 0.0ms | 0.0ms | N/A |"), "{stdout}");
}

fn read_workbook(path: &Path) -> MemoryWorkbook {
    serde_json::from_str(&fs::read_to_string(path).expect("read workbook")).expect("workbook json")
}

#[test]
fn load_test_saves_a_result_that_compares() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, workbook) = write_inputs(dir.path());
    let config = dir.path().join("fast.json");
    fs::write(&config, r#"{"loadTest":{"coolDownMs":0,"rounds":2}}"#).expect("write config");
    let config = config.to_string_lossy().into_owned();
    let original = fs::read_to_string(&workbook).expect("read workbook");

    let mut saved = Vec::new();
    for name in ["before.json", "after.json"] {
        let result_path = dir.path().join(name);
        let output = sheet_optimizer(&[
            "load-test",
            "--config",
            &config,
            "--workbook",
            &workbook,
            "--sheet",
            "2026-02",
            "--seed",
            "5",
            "--output",
            &result_path.to_string_lossy(),
        ]);
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with("2026-02: 2 round(s)"), "{stdout}");
        assert!(stdout.contains("6 cell(s) restored"), "{stdout}");

        let result: LoadTestResult =
            serde_json::from_str(&fs::read_to_string(&result_path).expect("read result"))
                .expect("result json");
        assert_eq!(result.sheet_name, "2026-02");
        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.cells_restored, 6);
        saved.push(result_path.to_string_lossy().into_owned());
    }
    assert_eq!(fs::read_to_string(&workbook).expect("read workbook"), original);

    let output = sheet_optimizer(&["compare-load-tests", &saved[0], &saved[1]]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("| Median |"));
}

#[test]
fn load_test_on_a_missing_sheet_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());
    let result_path = dir.path().join("result.json");

    let output = sheet_optimizer(&[
        "load-test",
        "--config",
        &config,
        "--workbook",
        &workbook,
        "--sheet",
        "2026-03",
        "--output",
        &result_path.to_string_lossy(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("2026-03"));
    assert!(!result_path.exists());
}

#[test]
fn cache_lifecycle_over_a_workbook_dump() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());
    let created = dir.path().join("created.json");
    let protected = dir.path().join("protected.json");
    let deleted = dir.path().join("deleted.json");
    let cache = OptimizerConfig::default().cache_sheet;

    let output = sheet_optimizer(&[
        "cache",
        "create",
        "--config",
        &config,
        "--workbook",
        &workbook,
        "--output",
        &created.to_string_lossy(),
    ]);
    assert!(output.status.success());
    let wb = read_workbook(&created);
    let sheet = wb.sheet(&cache).expect("cache sheet");
    assert!(!sheet.formula(a1("A5")).is_empty());

    // No evaluator runs over a dump, so the lookup column is blank.
    let output = sheet_optimizer(&[
        "cache",
        "validate",
        "--config",
        &config,
        "--workbook",
        &created.to_string_lossy(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let check: CacheValidation = serde_json::from_slice(&output.stdout).expect("validation json");
    assert!(!check.valid);
    assert_eq!(check.data_rows, 165);
    assert_eq!(check.empty_cells, 165);

    let output = sheet_optimizer(&[
        "cache",
        "protect",
        "--config",
        &config,
        "--workbook",
        &created.to_string_lossy(),
        "--output",
        &protected.to_string_lossy(),
    ]);
    assert!(output.status.success());
    let wb = read_workbook(&protected);
    let sheet = wb.sheet(&cache).expect("cache sheet");
    assert!(sheet.hidden);
    assert_eq!(sheet.protection.as_deref(), Some(CACHE_PROTECTION_DESCRIPTION));

    let output = sheet_optimizer(&[
        "cache",
        "delete",
        "--config",
        &config,
        "--workbook",
        &protected.to_string_lossy(),
        "--output",
        &deleted.to_string_lossy(),
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("deleted cache sheet"));
    assert!(read_workbook(&deleted).sheet(&cache).is_none());

    let output = sheet_optimizer(&[
        "cache",
        "delete",
        "--config",
        &config,
        "--workbook",
        &deleted.to_string_lossy(),
        "--output",
        &deleted.to_string_lossy(),
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no cache sheet"));
}

#[test]
fn cache_protect_without_a_cache_sheet_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, workbook) = write_inputs(dir.path());
    let out = dir.path().join("out.json");

    let output = sheet_optimizer(&[
        "cache",
        "protect",
        "--config",
        &config,
        "--workbook",
        &workbook,
        "--output",
        &out.to_string_lossy(),
    ]);
    assert!(!output.status.success());
    assert!(!out.exists());
}
