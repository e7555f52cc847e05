//! Basic CLI E2E tests.
//!
//! Each test points `TICKWORK_HOME` at its own temporary directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_tickwork"))
        .args(args)
        .env("TICKWORK_HOME", home)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

#[test]
fn test_config_path_and_defaults_written() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));

    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "tick_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1");
    assert!(home.path().join("config.toml").exists());
}

#[test]
fn test_config_set_roundtrip() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["config", "set", "daemons.public_ip.interval_secs", "30"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "daemons.public_ip.interval_secs"]);
    assert_eq!(stdout.trim(), "30");

    let (code, stdout, _) = run_cli(home.path(), &["config", "list"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["daemons"]["public_ip"]["interval_secs"], 30);
}

#[test]
fn test_config_rejects_unknown_key_and_bad_category() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error: unknown key"));

    run_cli(home.path(), &["config", "set", "daemons.movie_lighting.enabled", "true"]);
    let (code, _, stderr) = run_cli(
        home.path(),
        &["config", "set", "daemons.movie_lighting.categories", "operas"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("operas"));
}

#[test]
fn test_config_reset() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["config", "set", "tick_secs", "7"]);
    let (code, _, _) = run_cli(home.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "tick_secs"]);
    assert_eq!(stdout.trim(), "1");
}

#[test]
fn test_tasks_lists_json() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["tasks"]);
    assert_eq!(code, 0);
    let tasks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks[0]["label"], "Activity");
    assert!(tasks.iter().any(|t| t["label"] == "VPN" && t["enabled"] == true));
}

#[test]
fn test_run_fixed_ticks_without_network_daemons() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["config", "set", "daemons.public_ip.enabled", "false"]);
    run_cli(home.path(), &["config", "set", "logging.to_file", "false"]);

    let (code, _, stderr) = run_cli(home.path(), &["run", "--ticks", "1"]);
    assert_eq!(code, 0, "stderr: {stderr}");
}

#[test]
fn test_run_unknown_only_label_fails() {
    let home = tempfile::tempdir().unwrap();
    run_cli(home.path(), &["config", "set", "daemons.public_ip.enabled", "false"]);
    let (code, _, stderr) = run_cli(home.path(), &["run", "--ticks", "1", "--only", "Dict.cc"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no enabled task named 'Dict.cc'"));
}

#[test]
fn test_activity_current_prints_json() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["activity", "current"]);
    assert_eq!(code, 0);
    let current: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(current["descriptor"].is_string());
    assert!(current["categories"].is_array());
    assert!(current["idle_secs"].is_number());
}
