//! CLI Integration Tests
//!
//! These tests run the built binary and check argument handling and the
//! commands that need no Bluetooth adapter. Anything touching the radio is
//! covered in touch-core's hardware tests.
//!
//! ```
//! cargo test --package touch-cli --test cli_integration
//! ```

use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_touch-sdk"))
        .args(args)
        .env_remove("TOUCH_NAME_FILTER")
        .output()
        .expect("Failed to run touch-sdk binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["scan", "watch", "stream", "config"] {
        assert!(text.contains(command), "help should list {command}");
    }
}

#[test]
fn test_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_subcommand_help() {
    for command in ["scan", "watch", "stream", "config"] {
        let output = run(&[command, "--help"]);
        assert!(output.status.success(), "{command} --help failed");
    }

    let text = stdout(&run(&["watch", "--help"]));
    assert!(text.contains("--custom-data"));
    assert!(text.contains("--name"));
}

#[test]
fn test_unknown_command_fails() {
    let output = run(&["calibrate"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_format_fails() {
    let output = run(&["watch", "--format", "csv"]);
    assert!(!output.status.success());
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_path() {
    let output = run(&["config", "path"]);
    assert!(output.status.success());
    assert!(stdout(&output).trim_end().ends_with("config.toml"));
}

#[test]
fn test_config_show_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name_filter = \"pixel\"\nmonitor_interval_ms = 500\n").unwrap();

    let output = run(&["config", "show", "--config", path.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("name_filter = \"pixel\""));
    assert!(text.contains("monitor_interval_ms = 500"));
}

#[test]
fn test_config_show_rejects_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name_filter = [").unwrap();

    let output = run(&["config", "show", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_watch_rejects_bad_custom_data_before_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    let output = run(&[
        "watch",
        "--config",
        path.to_str().unwrap(),
        "--custom-data",
        "00002a19-0000-1000-8000-00805f9b34fb=<Z",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid configuration"));
}
