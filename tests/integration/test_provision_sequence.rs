use super::support::{Fixture, RecordingRunner, PYTHON};
use badge_bootstrap::{Bootstrapper, Step, StepStatus};
use std::fs;

/// End-to-end provisioning against the recording runner

#[tokio::test]
async fn test_steps_run_in_declared_order() {
    let fixture = Fixture::new();
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();

    let report = bootstrapper.provision().await.unwrap();
    let order: Vec<Step> = report.steps.iter().map(|r| r.step).collect();
    assert_eq!(order, Step::PROVISION.to_vec());
    assert!(report.steps.iter().all(|r| r.status == StepStatus::Executed));

    let lines = bootstrapper.runner().command_lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("{needle} never ran: {lines:?}"))
    };
    assert!(position("apt-get update") < position("apt-get install"));
    assert!(position("apt-get install") < position("install --upgrade pip"));
    assert!(position("install --upgrade pip") < position("install -r"));
    assert_eq!(
        lines[position("install -r")],
        format!(
            "{PYTHON} -m pip --disable-pip-version-check --no-cache-dir install -r .bootstrap/manifest/requirements.txt"
        )
    );
}

#[tokio::test]
async fn test_manifest_is_staged_apart_from_source() {
    let fixture = Fixture::new();
    fixture.write("lib/labels.py", "LABEL = 1\n");
    fixture.write("__pycache__/badge_app.cpython-312.pyc", "junk");
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();

    bootstrapper.provision().await.unwrap();

    let workdir = fixture.workdir();
    assert_eq!(
        fs::read_to_string(workdir.join(".bootstrap/manifest/requirements.txt")).unwrap(),
        "flask==2.0.0\n"
    );
    assert!(workdir.join("badge_app.py").is_file());
    assert!(workdir.join("lib/labels.py").is_file());
    assert!(!workdir.join("__pycache__").exists());
}

#[tokio::test]
async fn test_installer_processes_run_in_workdir() {
    let fixture = Fixture::new();
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();
    bootstrapper.provision().await.unwrap();

    let workdir = fixture.workdir();
    for call in bootstrapper.runner().calls() {
        if call.program == PYTHON {
            assert_eq!(call.cwd.as_deref(), Some(workdir.as_path()), "{call}");
        }
    }
}

#[tokio::test]
async fn test_up_launches_entry_point_last() {
    let fixture = Fixture::new();
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();
    bootstrapper.provision().await.unwrap();
    assert_eq!(bootstrapper.launch().unwrap(), 0);

    let calls = bootstrapper.runner().calls();
    let launch = calls.last().unwrap();
    assert_eq!(launch.program, PYTHON);
    assert_eq!(launch.args, vec!["badge_app.py".to_string()]);
    assert_eq!(launch.cwd.as_deref(), Some(fixture.workdir().as_path()));
}
