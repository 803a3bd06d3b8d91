//! CLI Integration Tests
//!
//! These tests run the `nrfgate` binary and check argument handling,
//! configuration management and input validation. None of them touch the
//! radio: every command exercised here either never scans or fails before
//! it would.
//!
//! ```
//! cargo test --package nrfgate-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

/// Run nrfgate with an isolated config file and no inherited overrides.
fn run_nrfgate(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nrfgate"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("NRFGATE_DEVICE")
        .env_remove("NRFGATE_CONFIG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run nrfgate binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(&dir.path().join("config.toml"), &["--help"]);

    assert!(output.status.success(), "Help should succeed");

    let out = stdout(&output);
    for cmd in ["scan", "send", "session", "config", "completions"] {
        assert!(out.contains(cmd), "Help should list {} command", cmd);
    }
}

#[test]
fn test_version_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(&dir.path().join("config.toml"), &["--version"]);

    assert!(output.status.success(), "Version should succeed");
    assert!(stdout(&output).contains("nrfgate"));
}

#[test]
fn test_subcommand_help() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    for cmd in ["scan", "send", "session", "config", "completions"] {
        let output = run_nrfgate(&config, &[cmd, "--help"]);
        assert!(output.status.success(), "{} --help should succeed", cmd);
        assert!(!stdout(&output).is_empty(), "{} --help should produce output", cmd);
    }
}

// =============================================================================
// Config Commands
// =============================================================================

#[test]
fn test_config_path_uses_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    let output = run_nrfgate(&config, &["config", "path"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("custom.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = run_nrfgate(&config, &["config", "init"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(config.exists());

    let output = run_nrfgate(&config, &["config", "show"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("NRF_Gateway_A"));
    assert!(out.contains("4fafc201-1fb5-459e-8fcc-c5c9c331914b"));
    assert!(out.contains("[repeat]"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "no_color = true\n").unwrap();

    let output = run_nrfgate(&config, &["config", "init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = run_nrfgate(&config, &["config", "init", "--force"]);
    assert!(output.status.success());
}

#[test]
fn test_config_show_reflects_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[target]\ndevice_name = \"Bench_Gateway\"\n").unwrap();

    let output = run_nrfgate(&config, &["config", "show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Bench_Gateway"));
}

// =============================================================================
// Input Validation (fails before any scan)
// =============================================================================

#[test]
fn test_send_rejects_long_message() {
    let dir = tempfile::tempdir().unwrap();
    let message = "x".repeat(26);
    let output = run_nrfgate(&dir.path().join("config.toml"), &["send", &message]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("too long"));
}

#[test]
fn test_send_rejects_empty_message() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(&dir.path().join("config.toml"), &["send", ""]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("empty"));
}

#[test]
fn test_send_rejects_zero_count() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(
        &dir.path().join("config.toml"),
        &["send", "hello", "--count", "0"],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("repeat_count"));
}

#[test]
fn test_once_conflicts_with_count() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(
        &dir.path().join("config.toml"),
        &["send", "hi", "--once", "--count", "2"],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot be used with"));
}

#[test]
fn test_invalid_config_blocks_send() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[repeat]\ninterval_ms = 0\n").unwrap();

    let output = run_nrfgate(&config, &["send", "hi"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("interval_ms"));
}

// =============================================================================
// Completions
// =============================================================================

#[test]
fn test_bash_completions() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_nrfgate(&dir.path().join("config.toml"), &["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("nrfgate"));
}
