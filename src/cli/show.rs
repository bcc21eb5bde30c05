// Show command implementation

use clap::Args;
use serde::Serialize;

use crate::cli::RecipeArgs;
use crate::utils::error::{BootstrapError, Result};

#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Python package name, e.g. flask
    pub package: String,
    #[command(flatten)]
    pub recipe: RecipeArgs,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub name: String,
    pub version: String,
    pub location: Option<String>,
}

impl ShowCommand {
    pub fn run(&self) -> Result<i32> {
        let bootstrapper = self.recipe.bootstrapper(false, false)?;
        let package = bootstrapper.installed_package(&self.package)?.ok_or_else(|| {
            BootstrapError::DependencyError(format!("Package '{}' is not installed", self.package))
        })?;

        if let Ok(manifest) = bootstrapper.load_manifest() {
            let pinned = manifest
                .requirement(&self.package)
                .and_then(|req| req.pinned_version());
            if let Some(pinned) = pinned.filter(|v| *v != package.version) {
                tracing::warn!(
                    package = %package.name,
                    installed = %package.version,
                    pinned,
                    "installed version differs from the manifest pin"
                );
            }
        }

        if self.json {
            let response = ShowResponse {
                name: package.name,
                version: package.version,
                location: package.location,
            };
            let json = serde_json::to_string_pretty(&response).map_err(|e| {
                BootstrapError::ExecutionError(format!("Failed to serialize JSON response: {e}"))
            })?;
            println!("{json}");
        } else {
            println!("{} {}", package.name, package.version);
        }
        Ok(0)
    }
}
