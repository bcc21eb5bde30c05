// Provision and up command implementation

use clap::Args;
use serde::Serialize;
use std::path::Path;

use crate::cli::RecipeArgs;
use crate::models::step::{BootstrapReport, StepRecord};
use crate::utils::error::{BootstrapError, Result};

#[derive(Debug, Args)]
pub struct ProvisionCommand {
    #[command(flatten)]
    pub recipe: RecipeArgs,
    /// Report native package installation as skipped
    #[arg(long)]
    pub skip_native: bool,
    /// Run every step even when its inputs are unchanged
    #[arg(long)]
    pub no_cache: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ProvisionResponse<'a> {
    pub status: &'static str,
    pub duration_ms: u64,
    pub workdir: String,
    pub steps: &'a [StepRecord],
}

impl ProvisionCommand {
    /// Provision and, for `up`, launch afterwards
    pub async fn run(&self, launch: bool) -> Result<i32> {
        let mut bootstrapper = self.recipe.bootstrapper(self.skip_native, self.no_cache)?;
        let report = bootstrapper.provision().await?;
        let duration_ms = u64::try_from(report.total_elapsed().as_millis()).unwrap_or(u64::MAX);

        if self.json {
            output_json_response(duration_ms, bootstrapper.workdir(), &report)?;
        } else {
            print_report(&report);
            println!(
                "\n✓ Environment ready in {} ({}ms)",
                bootstrapper.workdir().display(),
                duration_ms
            );
        }

        if launch {
            bootstrapper.launch()
        } else {
            Ok(0)
        }
    }
}

fn output_json_response(duration_ms: u64, workdir: &Path, report: &BootstrapReport) -> Result<()> {
    let response = ProvisionResponse {
        status: "success",
        duration_ms,
        workdir: workdir.display().to_string(),
        steps: &report.steps,
    };
    let json = serde_json::to_string_pretty(&response).map_err(|e| {
        BootstrapError::ExecutionError(format!("Failed to serialize JSON response: {e}"))
    })?;
    println!("{json}");
    Ok(())
}

/// One line per step: number, status, name, detail
pub fn print_report(report: &BootstrapReport) {
    for record in &report.steps {
        println!(
            "  [{}/7] {:<8} {:<24} {}",
            record.step.number(),
            record.status.to_string(),
            record.step.to_string(),
            record.detail
        );
    }
}
