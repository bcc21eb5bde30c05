use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Contract tests for `bootstrap launch`

/// Record a provisioned build whose interpreter is a plain shell
fn provisioned_workdir(workdir: &Path) {
    fs::create_dir_all(workdir.join(".bootstrap")).unwrap();
    fs::write(
        workdir.join(".bootstrap/state.json"),
        r#"{
  "version": 1,
  "layers": [],
  "interpreter": "/bin/sh",
  "copied_files": ["badge_app.py"],
  "updated_at": "2024-01-01T00:00:00+00:00"
}"#,
    )
    .unwrap();
    fs::write(
        workdir.join("badge_app.py"),
        "echo \"unbuffered=$PYTHONUNBUFFERED bytecode=$PYTHONDONTWRITEBYTECODE\"\npwd\n",
    )
    .unwrap();
}

#[cfg(unix)]
#[test]
fn test_launch_runs_entry_point_in_workdir_with_flags() {
    let temp_dir = TempDir::new().unwrap();
    let workdir = temp_dir.path().join("app");
    provisioned_workdir(&workdir);
    let canonical = workdir.canonicalize().unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["launch", "--workdir"])
        .arg(&workdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("unbuffered=1 bytecode=1"))
        .stdout(predicate::str::contains(canonical.to_string_lossy().to_string()));
}

#[cfg(unix)]
#[test]
fn test_launch_propagates_entry_point_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let workdir = temp_dir.path().join("app");
    provisioned_workdir(&workdir);
    fs::write(workdir.join("badge_app.py"), "exit 7\n").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["launch", "--workdir"])
        .arg(&workdir)
        .assert()
        .code(7);
}

#[test]
fn test_launch_without_provisioning() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.current_dir(&temp_dir)
        .args(["launch", "--workdir", "app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("badge_app.py"));
}
