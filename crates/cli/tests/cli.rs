use std::fs;
use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use tempfile::TempDir;

const HAS_TOOL: &str = r#"
name: has_tool
spec:
  test:
  - name: has_marker
    type: shell
    spec: test -f marker
  install:
  - name: create_marker
    type: shell
    spec: touch marker
"#;

fn wdm(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("wdm").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "info").env("NO_COLOR", "1");
    for var in [
        "WDM_TARGET",
        "WDM_DEPENDENCY_FILE",
        "WDM_ANSIBLE_CONFIG",
        "WDM_LIBRARY",
        "WDM_PREDEFINED",
        "WDM_CONFIG",
        "WDM_CONFIG_FILE",
        "WDM_SHELL_TRACE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn workspace(dependencies: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dependencies.yaml"), dependencies).unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_mode_fails_when_dependency_is_missing() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path()).arg("test").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("has_tool -> has_marker"));
    assert!(stderr(&output).contains("Test failed, exit with errcode=1."));
    assert!(!dir.path().join("marker").exists());
}

#[test]
fn ensure_installs_then_test_passes() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path()).arg("ensure").output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(dir.path().join("marker").exists());
    assert!(stdout(&output).contains("has_tool -> create_marker"));

    let output = wdm(dir.path()).args(["test", "has_tool"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Would have installed: nothing."));
}

#[test]
fn dryrun_runs_nothing() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path()).arg("dryrun").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("Would have tested:"));
    assert!(out.contains("has_tool -> create_marker"));
    assert!(!dir.path().join("marker").exists());
}

#[test]
fn configuration_reaches_shell_tasks() {
    let dir = workspace(
        r#"
name: settings
flavor: blue
---
name: has_flavor
spec:
  configuration:
  - flavor
  test:
  - name: check_flavor
    type: shell
    spec: test -f "$flavor"
  install:
  - name: write_flavor
    type: shell
    spec: touch "$flavor"
"#,
    );

    let output = wdm(dir.path()).arg("ensure").output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(dir.path().join("blue").exists());

    let output = wdm(dir.path())
        .args(["ensure", "--config", "flavor=red"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(dir.path().join("red").exists());
}

#[test]
fn missing_dependency_file_is_an_invocation_error() {
    let dir = TempDir::new().unwrap();

    let output = wdm(dir.path()).arg("test").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_target_fails() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path()).args(["test", "nope"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("has_tool"));
}

#[test]
fn list_prints_dependencies() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path()).arg("list").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("- has_tool"));
}

#[test]
fn example_prints_a_dependency_file() {
    let dir = TempDir::new().unwrap();

    let output = wdm(dir.path()).arg("example").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("name: has_gpu_operator"));
}

#[test]
fn empty_environment_variables_count_as_unset() {
    let dir = workspace(HAS_TOOL);
    fs::write(dir.path().join("marker"), "").unwrap();

    let output = wdm(dir.path())
        .arg("test")
        .env("WDM_DEPENDENCY_FILE", "")
        .env("WDM_SHELL_TRACE", "")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
}

#[test]
fn empty_variable_from_env_file_counts_as_unset() {
    let dir = workspace(HAS_TOOL);
    fs::write(dir.path().join("marker"), "").unwrap();
    fs::write(dir.path().join(".env"), "WDM_DEPENDENCY_FILE=\n").unwrap();

    let output = wdm(dir.path()).arg("test").output().unwrap();

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
}

#[test]
fn log_filter_can_come_from_env_file() {
    let dir = workspace(HAS_TOOL);
    fs::write(dir.path().join("marker"), "").unwrap();
    fs::write(dir.path().join(".env"), "RUST_LOG=warn\n").unwrap();

    let output = wdm(dir.path())
        .arg("test")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(!stderr(&output).contains("Resolving 'has_tool' dependency"));
}

#[test]
fn fatal_errors_are_logged_once() {
    let dir = workspace(
        r#"
name: has_template
spec:
  test:
  - name: use_template
    type: predefined
    spec:
      name: nope
"#,
    );

    let output = wdm(dir.path()).arg("test").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output).to_lowercase();
    assert_eq!(err.matches("could not find predefined task").count(), 1, "{}", err);
}

#[test]
fn logs_are_plain_when_not_a_terminal() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path())
        .arg("dryrun")
        .env_remove("NO_COLOR")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(!stderr(&output).contains('\u{1b}'));
}

#[test]
fn missing_explicit_config_file_is_an_invocation_error() {
    let dir = workspace(HAS_TOOL);

    let output = wdm(dir.path())
        .args(["test", "--config_file", "missing.cfg"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}
