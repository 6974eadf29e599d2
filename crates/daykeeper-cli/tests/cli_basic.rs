//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let output = Command::new("cargo")
        .args(["run", "-p", "daykeeper-cli", "--"])
        .args(args)
        .env("DAYKEEPER_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

/// A habit name unlikely to collide with earlier test runs.
fn unique_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

#[test]
fn test_habit_list() {
    let (code, _, _) = run_cli(&["habit", "list"]);
    assert_eq!(code, 0, "habit list failed");
}

#[test]
fn test_habit_list_json() {
    let (code, stdout, _) = run_cli(&["habit", "list", "--json"]);
    assert_eq!(code, 0, "habit list --json failed");
    assert!(serde_json::from_str::<serde_json::Value>(&stdout).is_ok());
}

#[test]
fn test_habit_add_mark_and_streak() {
    let name = unique_name("run");
    let (code, stdout, _) = run_cli(&["habit", "add", &name, "--every", "1"]);
    assert_eq!(code, 0, "habit add failed");
    assert!(stdout.contains("Habit created:"));

    let (code, stdout, _) = run_cli(&["habit", "mark", &name]);
    assert_eq!(code, 0, "habit mark failed");
    assert!(stdout.contains("marked for"));

    let (code, stdout, _) = run_cli(&["habit", "streak", &name]);
    assert_eq!(code, 0, "habit streak failed");
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(result["current_streak"].is_number());
    // Marking today records a completion even though the displayed
    // streak only counts days up to yesterday.
    assert!(result["last_completed"].is_string());

    let (code, _, _) = run_cli(&["habit", "remove", &name]);
    assert_eq!(code, 0, "habit remove failed");
}

#[test]
fn test_habit_add_rejects_zero_cadence() {
    let name = unique_name("bad");
    let (code, _, stderr) = run_cli(&["habit", "add", &name, "--every", "0"]);
    assert_ne!(code, 0, "zero cadence should be rejected");
    assert!(stderr.contains("cadence"));
}

#[test]
fn test_habit_mark_rejects_malformed_date() {
    let name = unique_name("mal");
    let (code, _, _) = run_cli(&["habit", "add", &name]);
    assert_eq!(code, 0, "habit add failed");

    let (code, _, stderr) = run_cli(&["habit", "mark", &name, "--date", "2024-13-40"]);
    assert_ne!(code, 0, "malformed date should be rejected");
    assert!(stderr.contains("Malformed date"));

    let (code, _, _) = run_cli(&["habit", "remove", &name]);
    assert_eq!(code, 0, "habit remove failed");
}

#[test]
fn test_partner_list() {
    let (code, _, _) = run_cli(&["partner", "list"]);
    assert_eq!(code, 0, "partner list failed");
}

#[test]
fn test_config_list() {
    let (code, stdout, _) = run_cli(&["config", "list"]);
    assert_eq!(code, 0, "config list failed");
    assert!(serde_json::from_str::<serde_json::Value>(&stdout).is_ok());
}

#[test]
fn test_config_get() {
    let (code, stdout, _) = run_cli(&["config", "get", "feed.poll_interval_secs"]);
    assert_eq!(code, 0, "config get failed");
    assert!(stdout.trim().parse::<u64>().is_ok());
}

#[test]
fn test_config_get_unknown_key() {
    let (code, _, stderr) = run_cli(&["config", "get", "feed.nope"]);
    assert_ne!(code, 0, "unknown key should fail");
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_set() {
    let (code, _, _) = run_cli(&["config", "set", "habits.default_cadence_days", "1"]);
    assert_eq!(code, 0, "config set failed");
}
