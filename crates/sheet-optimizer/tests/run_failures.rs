use pretty_assertions::assert_eq;
use sheet_optimizer::{
    AbortHandle, Coordinator, HostError, HostOperation, MemoryHost, OptimizerConfig,
    OptimizerError, StepKind, StepState,
};

mod common;

use common::{a1, workbook};

fn host_with_open_sums(config: &OptimizerConfig) -> MemoryHost {
    let mut wb = workbook(config);
    let sheet = wb.sheet_mut(&config.target_sheet).expect("target sheet");
    sheet.set_formula(a1("S2"), "=SUM(S5:S)");
    sheet.set_formula(a1("AJ2"), "=SUM(AJ5:AJ)");
    MemoryHost::new(wb)
}

#[test]
fn dry_run_previews_without_touching_the_host() {
    let config = OptimizerConfig::default();
    let mut coordinator = Coordinator::with_seed(host_with_open_sums(&config), config, 1);

    let report = coordinator.run_all(true).expect("dry-run");

    assert!(report.dry_run);
    assert_eq!(report.final_check, None);
    assert!(report.steps.iter().all(|s| s.state == StepState::DryRun));
    assert_eq!(coordinator.host().writes(), 0);
    assert_eq!(coordinator.host().recomputes(), 0);
    assert!(coordinator.host().reads() > 0);

    let planned: Vec<(String, &str)> = report
        .planned_formulas()
        .into_iter()
        .filter(|w| w.sheet == "2026-02" && w.cell.row == 2)
        .map(|w| (w.cell.to_a1(), w.after.as_str()))
        .collect();
    assert_eq!(planned[0], ("S2".to_string(), "=SUM(S5:S169)"));
    assert_eq!(planned[1], ("AJ2".to_string(), "=SUM(AJ5:AJ200)"));
    assert!(planned.iter().any(|(cell, _)| cell == "N2"));

    let sheet = coordinator
        .host()
        .workbook()
        .sheet("2026-02")
        .expect("target sheet");
    assert_eq!(sheet.formula(a1("S2")), "=SUM(S5:S)");
}

#[test]
fn missing_master_sheet_fails_before_any_mutation() {
    let config = OptimizerConfig::default();
    let mut host = host_with_open_sums(&config);
    host.workbook_mut().sheets.remove("Master");
    let mut coordinator = Coordinator::with_seed(host, config, 1);

    let err = coordinator.run_all(false).unwrap_err();

    assert!(matches!(
        &err,
        OptimizerError::MissingSheet { sheet } if sheet == "Master"
    ));
    assert_eq!(err.to_string(), "sheet 'Master' not found");
    assert_eq!(coordinator.host().writes(), 0);
    assert_eq!(coordinator.host().reads(), 0);
}

#[test]
fn missing_target_sheet_fails_a_single_step() {
    let mut coordinator = Coordinator::with_seed(
        MemoryHost::new(sheet_optimizer::MemoryWorkbook::new()),
        OptimizerConfig::default(),
        1,
    );
    let err = coordinator.run_step(StepKind::ErrorScope, false).unwrap_err();
    assert!(matches!(err, OptimizerError::MissingSheet { .. }));
}

#[test]
fn host_recompute_failure_propagates() {
    let config = OptimizerConfig::default();
    let host = host_with_open_sums(&config);
    host.fail_next(HostOperation::Recompute, "recalculation timed out");
    let mut coordinator = Coordinator::with_seed(host, config, 1);

    let err = coordinator.run_all(false).unwrap_err();

    match err {
        OptimizerError::Host(HostError { operation, message }) => {
            assert_eq!(operation, HostOperation::Recompute);
            assert_eq!(message, "recalculation timed out");
        }
        other => panic!("expected a host error, got {other:?}"),
    }
    // Closure committed before consolidation's cache barrier failed.
    let sheet = coordinator
        .host()
        .workbook()
        .sheet("2026-02")
        .expect("target sheet");
    assert_eq!(sheet.formula(a1("S2")), "=SUM(S5:S169)");
}

#[test]
fn host_write_failure_propagates() {
    let config = OptimizerConfig::default();
    let host = host_with_open_sums(&config);
    host.fail_next(HostOperation::WriteFormula, "permission denied");
    let mut coordinator = Coordinator::with_seed(host, config, 1);

    let err = coordinator.run_step(StepKind::Closure, false).unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::Host(HostError {
            operation: HostOperation::WriteFormula,
            ..
        })
    ));
    assert_eq!(coordinator.host().writes(), 0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = OptimizerConfig::default();
    config.cache_sheet = config.target_sheet.clone();
    let host = host_with_open_sums(&OptimizerConfig::default());
    let mut coordinator = Coordinator::with_seed(host, config, 1);

    let err = coordinator.run_all(false).unwrap_err();
    assert!(matches!(err, OptimizerError::InvalidConfig(_)));
    assert_eq!(coordinator.host().writes(), 0);
}

#[test]
fn abort_between_steps_stops_later_steps() {
    let config = OptimizerConfig::default();
    let abort = AbortHandle::new();
    let trigger = abort.clone();
    // The first barrier of the run belongs to consolidation's cache write.
    let host = MemoryHost::new(host_with_open_sums(&config).into_workbook())
        .on_recompute(move |_| trigger.abort());
    let mut coordinator = Coordinator::with_seed(host, config, 1);

    let report = coordinator.run_all_with(false, &abort).expect("run");

    assert!(report.aborted);
    let ran: Vec<StepKind> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(ran, vec![StepKind::Closure, StepKind::Consolidation]);
    assert!(report.final_check.is_some());

    let sheet = coordinator
        .host()
        .workbook()
        .sheet("2026-02")
        .expect("target sheet");
    assert_eq!(sheet.formula(a1("BQ5")), "");
    assert_eq!(sheet.formula(a1("S2")), "=SUM(S5:S169)");
}
