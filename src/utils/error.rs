// Common error types for the bootstrapper

use std::path::PathBuf;
use thiserror::Error;

/// Every way a bootstrap run can fail. None of them are recovered from.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Native package installation failed: {0}")]
    NativeInstallError(String),

    #[error("Dependency installation failed: {0}")]
    DependencyError(String),

    #[error("Missing source: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("State file error: {0}")]
    StateError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// User-facing rendering of a [`BootstrapError`] with an exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    pub message: String,
    pub hint: Option<String>,
    pub exit_code: i32,
}

impl UserError {
    /// Exit code for provisioning failures (native install, dependencies, missing source).
    pub const PROVISIONING_FAILURE: i32 = 1;
    /// Exit code for recipe and validation problems.
    pub const USAGE_FAILURE: i32 = 2;

    pub fn from_bootstrap_error(err: &BootstrapError) -> Self {
        let (exit_code, hint) = match err {
            BootstrapError::ConfigError(_) => (
                Self::USAGE_FAILURE,
                Some("Check bootstrap.toml or pass --recipe <file>".to_string()),
            ),
            BootstrapError::ValidationError(_) => (Self::USAGE_FAILURE, None),
            BootstrapError::NativeInstallError(_) => (
                Self::PROVISIONING_FAILURE,
                Some("Use --skip-native on hosts without apt-get".to_string()),
            ),
            BootstrapError::DependencyError(_) => (
                Self::PROVISIONING_FAILURE,
                Some("Verify every entry of the manifest resolves on the package index".to_string()),
            ),
            BootstrapError::MissingSource(_) => (
                Self::PROVISIONING_FAILURE,
                Some("Run from the build context or pass --context <dir>".to_string()),
            ),
            BootstrapError::IoError(_)
            | BootstrapError::ExecutionError(_)
            | BootstrapError::StateError(_) => (Self::PROVISIONING_FAILURE, None),
        };

        Self {
            message: err.to_string(),
            hint,
            exit_code,
        }
    }

    pub fn print(&self) {
        eprintln!("error: {}", self.message);
        if let Some(hint) = &self.hint {
            eprintln!("hint: {hint}");
        }
    }
}
