use super::support::{Fixture, RecordingRunner};
use badge_bootstrap::Bootstrapper;

/// Both flags reach every process the bootstrapper starts

#[tokio::test]
async fn test_flags_on_every_invocation() {
    let fixture = Fixture::new();
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();
    bootstrapper.provision().await.unwrap();
    bootstrapper.launch().unwrap();

    let calls = bootstrapper.runner().calls();
    assert!(calls.len() > 5);
    for call in &calls {
        assert_eq!(call.env.get("PYTHONDONTWRITEBYTECODE").map(String::as_str), Some("1"), "{call}");
        assert_eq!(call.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"), "{call}");
    }
}

#[tokio::test]
async fn test_disabled_flag_is_not_exported() {
    let fixture = Fixture::new();
    let mut recipe = fixture.recipe();
    recipe.environment.dont_write_bytecode = false;
    let bootstrapper = Bootstrapper::new(recipe, fixture.options(), RecordingRunner::default()).unwrap();

    let env = bootstrapper.environment();
    assert!(!env.contains_key("PYTHONDONTWRITEBYTECODE"));
    assert_eq!(env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_venv_is_activated_for_installs_and_launch() {
    let fixture = Fixture::new();
    let mut recipe = fixture.recipe();
    recipe.runtime.venv = Some(".venv".to_string());
    let mut bootstrapper = Bootstrapper::new(recipe, fixture.options(), RecordingRunner::default()).unwrap();
    bootstrapper.provision().await.unwrap();
    bootstrapper.launch().unwrap();

    let venv = fixture.workdir().join(".venv");
    let venv_python = venv.join("bin").join("python");
    let calls = bootstrapper.runner().calls();
    assert!(calls
        .iter()
        .any(|c| c.args.windows(2).any(|w| w == ["-m", "venv"])));
    let launch = calls.last().unwrap();
    assert_eq!(launch.program, venv_python.to_string_lossy());
    assert_eq!(
        launch.env.get("VIRTUAL_ENV").map(String::as_str),
        Some(&*venv.to_string_lossy())
    );
}
