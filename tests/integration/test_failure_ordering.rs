use super::support::{Fixture, RecordingRunner};
use badge_bootstrap::{BootstrapError, Bootstrapper, Step};

/// Failures stop the sequence where they happen

#[tokio::test]
async fn test_unavailable_native_package_fails_before_dependencies() {
    let fixture = Fixture::new();
    let runner = RecordingRunner::failing_on("apt-get install", "E: Unable to locate package libgl1");
    let mut bootstrapper = Bootstrapper::new(fixture.recipe(), fixture.options(), runner).unwrap();

    let err = bootstrapper.provision().await.unwrap_err();
    assert!(matches!(err, BootstrapError::NativeInstallError(_)));
    assert!(err.to_string().contains("Unable to locate package"));

    let lines = bootstrapper.runner().command_lines();
    assert!(!lines.iter().any(|l| l.contains("pip")));
    assert!(!fixture.workdir().exists());
}

#[tokio::test]
async fn test_invalid_native_name_never_reaches_apt() {
    let fixture = Fixture::new();
    let mut recipe = fixture.recipe();
    recipe.native.packages.push("Bad_Name".to_string());
    let mut bootstrapper =
        Bootstrapper::new(recipe, fixture.options(), RecordingRunner::default()).unwrap();

    let err = bootstrapper.provision().await.unwrap_err();
    assert!(matches!(err, BootstrapError::NativeInstallError(_)));
    assert!(bootstrapper.runner().calls().is_empty());
}

#[tokio::test]
async fn test_unresolvable_dependency_fails_before_source_copy() {
    let fixture = Fixture::new();
    fixture.write("requirements.txt", "flask==2.0.0\nnosuchpkg==9.9\n");
    let runner = RecordingRunner::failing_on(
        "install -r",
        "ERROR: No matching distribution found for nosuchpkg==9.9",
    );
    let mut bootstrapper = Bootstrapper::new(fixture.recipe(), fixture.options(), runner).unwrap();

    let err = bootstrapper.provision().await.unwrap_err();
    assert!(matches!(err, BootstrapError::DependencyError(_)));

    let lines = bootstrapper.runner().command_lines();
    assert!(lines.iter().any(|l| l.starts_with("apt-get install")));
    assert!(!fixture.workdir().join("badge_app.py").exists());

    // the failed step and everything after it are not recorded
    let state = bootstrapper.state();
    assert!(state.key_for(Step::UpgradeInstaller).is_some());
    assert!(state.key_for(Step::InstallDependencies).is_none());
    assert!(state.key_for(Step::CopySource).is_none());
}

#[tokio::test]
async fn test_missing_entry_point_fails_copy() {
    let fixture = Fixture::new();
    let mut recipe = fixture.recipe();
    recipe.app.entry_point = "main.py".to_string();
    let mut bootstrapper =
        Bootstrapper::new(recipe, fixture.options(), RecordingRunner::default()).unwrap();

    let err = bootstrapper.provision().await.unwrap_err();
    assert!(matches!(err, BootstrapError::MissingSource(path) if path.ends_with("main.py")));
}

#[tokio::test]
async fn test_interpreter_mismatch_is_validation_error() {
    let fixture = Fixture::new();
    let mut recipe = fixture.recipe();
    recipe.runtime.python = "3.11".to_string();
    let mut bootstrapper =
        Bootstrapper::new(recipe, fixture.options(), RecordingRunner::default()).unwrap();

    let err = bootstrapper.provision().await.unwrap_err();
    assert!(matches!(err, BootstrapError::ValidationError(_)));
    assert!(err.to_string().contains("Python 3.11 is required"));
}
