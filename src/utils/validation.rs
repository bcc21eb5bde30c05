// Common validation utilities for bootstrap inputs

use regex::Regex;
use std::sync::OnceLock;

use crate::models::manifest::is_valid_project_name;
use crate::utils::error::{BootstrapError, Result};

fn debian_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9+.-]+$").expect("valid package regex"))
}

/// Validate a Debian package name, optionally with an `=version` pin or `:arch` qualifier
pub fn validate_native_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BootstrapError::NativeInstallError(
            "Native package name cannot be empty".to_string(),
        ));
    }

    let base = name.split(&['=', ':'][..]).next().unwrap_or(name);

    if !debian_name_regex().is_match(base) {
        return Err(BootstrapError::NativeInstallError(format!(
            "Invalid native package name '{name}'.\n\nDebian package names are lowercase and may contain digits and '+', '-', '.':\n  ✓ libgl1\n  ✓ libglib2.0-0\n  ✗ LibGL"
        )));
    }

    Ok(())
}

/// Validate a Python package name given on the command line
pub fn validate_python_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BootstrapError::ValidationError(
            "Package name cannot be empty.\n\nUsage: bootstrap show <package>\nExample: bootstrap show flask".to_string(),
        ));
    }

    if !is_valid_project_name(name) {
        return Err(BootstrapError::ValidationError(format!(
            "Invalid Python package name '{name}'.\n\nValid package names:\n  ✓ flask\n  ✓ Flask-Cors\n  ✗ my package"
        )));
    }

    Ok(())
}
