//! CLI binary integration tests.
//!
//! These tests exercise the compiled `voicegate` binary to verify that
//! top-level command routing, help text, and error handling work as expected.

use std::process::Command;
use tempfile::TempDir;

fn voicegate_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_voicegate"));
    cmd.env_remove("VOICEGATE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_version() {
    let output = voicegate_cmd()
        .arg("version")
        .output()
        .expect("failed to run voicegate");
    assert!(output.status.success(), "version command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("voicegate"), "got: {}", stdout);
}

#[test]
fn test_cli_help() {
    let output = voicegate_cmd()
        .arg("--help")
        .output()
        .expect("failed to run voicegate");
    assert!(output.status.success(), "--help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "tools", "config"] {
        assert!(stdout.contains(command), "help should mention '{}'", command);
    }
}

#[test]
fn test_cli_unknown_command() {
    let output = voicegate_cmd()
        .arg("nonexistent-command")
        .output()
        .expect("failed to run voicegate");
    assert!(!output.status.success(), "unknown command should fail");
}

#[test]
fn test_cli_tools_list_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicegate.json5");
    std::fs::write(
        &path,
        r#"{
            tools: {
                clock: true,
                webhooks: [{ name: "search_algolia", description: "Search docs", url: "https://search.example.com" }],
            },
        }"#,
    )
    .unwrap();

    let output = voicegate_cmd()
        .arg("--config")
        .arg(&path)
        .args(["tools", "list", "--json"])
        .output()
        .expect("failed to run voicegate");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let definitions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = definitions
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert_eq!(names, vec!["current_time", "search_algolia"]);
}

#[test]
fn test_cli_config_check_rejects_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voicegate.json5");
    std::fs::write(&path, r#"{ gateway: { path: "no-leading-slash" } }"#).unwrap();

    let output = voicegate_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "check"])
        .output()
        .expect("failed to run voicegate");
    assert!(!output.status.success(), "invalid config should fail the check");
}
