use std::collections::BTreeMap;

use crate::services::runner::{CommandRunner, Invocation};
use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::validate_native_package_name;

/// Installs native system libraries through apt-get
pub struct NativePackageInstaller<'a> {
    runner: &'a dyn CommandRunner,
    env: BTreeMap<String, String>,
}

impl<'a> NativePackageInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, env: &BTreeMap<String, String>) -> Self {
        let mut env = env.clone();
        env.insert("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string());
        Self { runner, env }
    }

    /// Reject every malformed name before touching the package database
    pub fn validate(packages: &[String]) -> Result<()> {
        packages
            .iter()
            .try_for_each(|p| validate_native_package_name(p))
    }

    /// Refresh the index, install the packages, drop the index again.
    ///
    /// Returns the number of packages requested.
    pub fn install(&self, packages: &[String]) -> Result<usize> {
        Self::validate(packages)?;
        if packages.is_empty() {
            tracing::info!("no native packages requested");
            return Ok(0);
        }

        tracing::info!(count = packages.len(), "installing native packages");
        self.apt(Invocation::new("apt-get").arg("update"), "apt-get update")?;
        self.apt(
            Invocation::new("apt-get")
                .args(["install", "-y", "--no-install-recommends"])
                .args(packages.iter().cloned()),
            "apt-get install",
        )?;
        self.apt(
            Invocation::new("sh").args(["-c", "rm -rf /var/lib/apt/lists/*"]),
            "apt list cleanup",
        )?;

        Ok(packages.len())
    }

    fn apt(&self, invocation: Invocation, what: &str) -> Result<()> {
        let invocation = invocation.envs(&self.env);
        let output = self.runner.run(&invocation)?;
        if output.is_success() {
            Ok(())
        } else {
            Err(BootstrapError::NativeInstallError(format!(
                "{what} failed: {}",
                output.failure_summary()
            )))
        }
    }
}
