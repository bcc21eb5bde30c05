use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Contract tests for `bootstrap show`

#[test]
fn test_show_rejects_invalid_name() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["show", "my package", "--workdir", "app"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid Python package name"));
}

#[test]
fn test_show_requires_package_argument() {
    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.args(["show"]).assert().failure();
}
