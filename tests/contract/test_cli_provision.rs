use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Contract tests for `bootstrap provision`

fn badge_context() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("badge_app.py"), "print('badge')\n").unwrap();
    temp_dir
}

#[test]
fn test_provision_missing_context() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--context", "does-not-exist", "--workdir", "app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing source"));
}

#[test]
fn test_provision_missing_manifest() {
    let temp_dir = badge_context();
    let workdir = temp_dir.path().join("out");

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--skip-native", "--workdir"])
        .arg(&workdir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing source"))
        .stderr(predicate::str::contains("requirements.txt"));

    // the working directory step ran before the manifest was needed
    assert!(workdir.is_dir());
    assert!(!workdir.join("badge_app.py").exists());
}

#[test]
fn test_provision_invalid_native_package_fails_first() {
    let temp_dir = badge_context();
    fs::write(temp_dir.path().join("requirements.txt"), "flask==2.0.0\n").unwrap();
    fs::write(
        temp_dir.path().join("bootstrap.toml"),
        "[native]\npackages = [\"libgl1\", \"Not A Package\"]\n",
    )
    .unwrap();
    let workdir = temp_dir.path().join("out");

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--workdir"])
        .arg(&workdir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid native package name 'Not A Package'"));

    assert!(!workdir.exists());
}

#[test]
fn test_provision_invalid_manifest_line() {
    let temp_dir = badge_context();
    fs::write(temp_dir.path().join("requirements.txt"), "flask >> 2.0\n").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--skip-native", "--workdir", "out"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requirements.txt:1"));
}

#[test]
fn test_provision_bad_recipe() {
    let temp_dir = badge_context();
    fs::write(temp_dir.path().join("bootstrap.toml"), "[native]\nmanager = \"yum\"\n").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--workdir", "out"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only apt-get is supported"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_provision_unknown_recipe_file() {
    let temp_dir = badge_context();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["provision", "--recipe", "missing.toml", "--workdir", "out"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Recipe file not found"));
}
