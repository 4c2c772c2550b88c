//! CLI tests for foreman commands.
//!
//! Spawns the foreman binary and verifies exit codes match the documented
//! contract: 0 complete/ok, 1 incomplete or error, 2 more work remains.

use std::fs;
use std::process::Command;

use foreman::core::feature::Priority;
use foreman::exit_codes;
use foreman::test_support::{TestProject, feature};

fn foreman_cmd(project: &TestProject) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_foreman"));
    cmd.current_dir(&project.paths().root);
    cmd
}

#[test]
fn status_check_exits_remaining_when_incomplete() {
    let project = TestProject::new(vec![feature("open", Priority::High, false)]);

    let status = foreman_cmd(&project)
        .args(["status", "--check"])
        .status()
        .expect("foreman status");

    assert_eq!(status.code(), Some(exit_codes::REMAINING));
}

#[test]
fn status_check_exits_ok_when_complete() {
    let project = TestProject::new(vec![feature("done", Priority::High, true)]);

    let status = foreman_cmd(&project)
        .args(["status", "--check"])
        .status()
        .expect("foreman status");

    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn validate_exits_error_on_invalid_checklist() {
    let project = TestProject::new(Vec::new());
    fs::write(
        &project.paths().feature_list_path,
        r#"{"features": [{"id": "a", "category": "c", "description": "d",
            "priority": "urgent", "steps": [], "passes": false}]}"#,
    )
    .expect("write");

    let status = foreman_cmd(&project)
        .arg("validate")
        .status()
        .expect("foreman validate");

    assert_eq!(status.code(), Some(exit_codes::ERROR));
}

#[test]
fn validate_exits_ok_on_valid_checklist() {
    let project = TestProject::new(vec![feature("a", Priority::Low, false)]);

    let status = foreman_cmd(&project)
        .arg("validate")
        .status()
        .expect("foreman validate");

    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn init_refuses_existing_scaffolding() {
    let project = TestProject::new(Vec::new());

    let status = foreman_cmd(&project)
        .arg("init")
        .status()
        .expect("foreman init");

    assert_eq!(status.code(), Some(exit_codes::ERROR));
}

#[test]
fn update_flips_feature_and_exits_ok() {
    let project = TestProject::new(vec![feature("a", Priority::High, false)]);

    let status = foreman_cmd(&project)
        .args(["update", "a", "pass"])
        .status()
        .expect("foreman update");
    assert_eq!(status.code(), Some(exit_codes::OK));

    let check = foreman_cmd(&project)
        .args(["status", "--check"])
        .status()
        .expect("foreman status");
    assert_eq!(check.code(), Some(exit_codes::OK));
}

#[test]
fn update_unknown_id_exits_error() {
    let project = TestProject::new(vec![feature("a", Priority::High, false)]);

    let status = foreman_cmd(&project)
        .args(["update", "missing", "pass"])
        .status()
        .expect("foreman update");

    assert_eq!(status.code(), Some(exit_codes::ERROR));
}

#[test]
fn dry_run_selects_without_executing() {
    let project = TestProject::new(vec![
        feature("low-1", Priority::Low, false),
        feature("crit-1", Priority::Critical, false),
    ]);

    let output = foreman_cmd(&project)
        .args(["run", "--dry-run"])
        .output()
        .expect("foreman run --dry-run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[crit-1]"));
    // No session ran, so no ledger was created.
    assert!(!project.paths().ledger_path.exists());
}
