//! Integration tests for command registration, output modes and the
//! local-only commands.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ephem() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ephem"));
    cmd.env("NO_COLOR", "1");
    cmd
}

/// A command whose home directory is an empty temp dir, so no real session
/// record or key file is ever touched.
fn ephem_in(home: &TempDir) -> Command {
    let mut cmd = ephem();
    cmd.env("HOME", home.path())
        .env("EPHEM_CONFIG", home.path().join("config.yaml"));
    cmd
}

// --- Help and version ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    ephem().assert().code(2).stderr(predicate::str::contains(
        "One throwaway EC2 instance",
    ));
}

#[test]
fn test_cli_help_lists_every_command() {
    let assert = ephem().arg("--help").assert().success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    for command in ["up", "cleanup", "status", "workloads", "config", "version"] {
        assert!(out.contains(command), "missing {command} in:\n{out}");
    }
}

#[test]
fn test_version_command_shows_version() {
    ephem()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ephem v0.1.0"));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    ephem()
        .args(["version", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""version": "0.1.0""#));
}

#[test]
fn test_unknown_command_is_a_usage_error() {
    ephem().arg("launch").assert().code(2);
}

#[test]
fn test_up_rejects_non_numeric_hold() {
    ephem()
        .args(["up", "a", "--hold", "soon"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--hold"));
}

#[test]
fn test_up_help_documents_image_and_hold() {
    ephem()
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--image"))
        .stdout(predicate::str::contains("--hold"));
}

// --- Workloads ---

#[test]
fn test_workloads_lists_the_catalog() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .arg("workloads")
        .assert()
        .success()
        .stdout(predicate::str::contains("nginx"))
        .stdout(predicate::str::contains("mysql"))
        .stdout(predicate::str::contains("custom"));
}

#[test]
fn test_workloads_json_has_one_entry_per_workload() {
    let home = TempDir::new().expect("temp dir");
    let assert = ephem_in(&home).args(["workloads", "--json"]).assert().success();
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    let entries = value["workloads"].as_array().expect("workloads array");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["name"], "nginx");
    assert!(entries[2]["image"].is_null());
}

#[test]
fn test_workloads_shows_configured_custom_image() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .args(["config", "set", "workloads.custom_image", "redis:7"])
        .assert()
        .success();
    ephem_in(&home)
        .arg("workloads")
        .assert()
        .success()
        .stdout(predicate::str::contains("redis:7"));
}

// --- Session record ---

#[test]
fn test_status_without_record() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded session"));
}

#[test]
fn test_status_json_without_record_is_null() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""session": null"#));
}

#[test]
fn test_cleanup_without_record_fails() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .args(["cleanup", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to clean up"));
}

#[test]
fn test_cleanup_without_record_json_error_code() {
    let home = TempDir::new().expect("temp dir");
    ephem_in(&home)
        .args(["cleanup", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""code": "nothing_recorded""#));
}

#[test]
fn test_corrupt_record_is_reported_not_ignored() {
    let home = TempDir::new().expect("temp dir");
    let dir = home.path().join(".ephem");
    std::fs::create_dir_all(&dir).expect("state dir");
    std::fs::write(dir.join("session.json"), "{ not json").expect("write record");
    ephem_in(&home)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("session record"));
}
