use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Contract tests for `bootstrap env`

#[test]
fn test_env_prints_both_flags() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["env", "--workdir", "app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PYTHONDONTWRITEBYTECODE=1"))
        .stdout(predicate::str::contains("PYTHONUNBUFFERED=1"));
}

#[test]
fn test_env_includes_recipe_extras_and_venv() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("bootstrap.toml"),
        r#"
[runtime]
venv = ".venv"

[environment.extra]
QT_QPA_PLATFORM = "xcb"
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    let output = cmd
        .current_dir(&temp_dir)
        .args(["env", "--json", "--workdir", "/srv/badge"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let vars: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(vars["PYTHONUNBUFFERED"], "1");
    assert_eq!(vars["QT_QPA_PLATFORM"], "xcb");
    assert_eq!(vars["VIRTUAL_ENV"], "/srv/badge/.venv");
}

#[test]
fn test_env_rejects_invalid_recipe() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bootstrap.toml"), "[runtime]\npython = \"two\"\n").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["env"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid Python version pin"));
}
