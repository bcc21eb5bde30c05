use super::support::{Fixture, RecordingRunner};
use badge_bootstrap::{BootstrapError, Bootstrapper};

/// Querying installed packages after a build

#[tokio::test]
async fn test_pinned_flask_is_reported() {
    let fixture = Fixture::new();
    let mut bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();
    bootstrapper.provision().await.unwrap();

    let flask = bootstrapper.installed_package("flask").unwrap().unwrap();
    assert_eq!(flask.version, "2.0.0");
    assert!(bootstrapper.installed_package("django").unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    let fixture = Fixture::new();
    let bootstrapper =
        Bootstrapper::new(fixture.recipe(), fixture.options(), RecordingRunner::default()).unwrap();
    assert!(matches!(
        bootstrapper.installed_package("not a name"),
        Err(BootstrapError::ValidationError(_))
    ));
}
