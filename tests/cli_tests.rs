#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.write_stdin(script.to_string()).assert()
}

#[test]
fn cli_add_and_delete_task() {
    run_cli("add 1 HRS threshold 500 Engine borescope\ndelete 1\nquit\n")
        .success()
        .stdout(str_contains("Task upserted."))
        .stdout(str_contains("Deleted task 1."));
}

#[test]
fn cli_compute_flags_overdue_task() {
    run_cli(
        "add 1 HRS threshold 100 Gear overhaul\nusage 1 150 40 2025-03-01\ncompute\nquit\n",
    )
    .success()
    .stdout(str_contains("overdue=1"))
    .stdout(str_contains("overdue_ids=1"));
}

#[test]
fn cli_status_prints_margins() {
    run_cli(
        "add 1 HRS repeat 100 Oil change\nusage 1 60 30 2025-03-01\nstatus 1\nquit\n",
    )
    .success()
    .stdout(str_contains("Task 1 'Oil change': ok (controlling unit HRS)"))
    .stdout(str_contains("HRS"));
}

#[test]
fn cli_rejects_invalid_window() {
    run_cli("add 1 HRS threshold 500 Borescope\nwindow 1 75\nquit\n")
        .success()
        .stdout(str_contains("window_pct 75 outside [0, 50]"));
}

#[test]
fn cli_reports_metadata_validation_errors() {
    run_cli("meta horizon -3\nquit\n")
        .success()
        .stdout(str_contains("review horizon must be non-negative"));
}

#[test]
fn cli_save_and_load_json_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_string_lossy().replace('\\', "\\\\");
    let script = format!(
        "add 1 HRS threshold 400 LongLivedTask\nsave json {}\nadd 2 CYC repeat 50 TempTask\nload json {}\nshow\nquit\n",
        path, path
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(
        output.contains("Registry loaded from"),
        "expected output to mention load completion"
    );
    assert!(
        output.contains("LongLivedTask"),
        "expected persisted task to remain"
    );
    let after_reload = output
        .split("Registry loaded from")
        .last()
        .unwrap_or_default();
    assert!(
        !after_reload.contains("TempTask"),
        "temporary task should not appear after reload:\n{}",
        after_reload
    );
}

#[test]
fn cli_lists_source_types() {
    run_cli("sources\nquit\n")
        .success()
        .stdout(str_contains("Airworthiness directive"))
        .stdout(str_contains("Service bulletin"));
}
