// Plan command implementation

use clap::Args;

use crate::cli::provision::print_report;
use crate::cli::RecipeArgs;
use crate::utils::error::{BootstrapError, Result};

#[derive(Debug, Args)]
pub struct PlanCommand {
    #[command(flatten)]
    pub recipe: RecipeArgs,
    /// Plan with native installation skipped
    #[arg(long)]
    pub skip_native: bool,
    /// Plan as if no previous build existed
    #[arg(long)]
    pub no_cache: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub fn run(&self) -> Result<i32> {
        let bootstrapper = self.recipe.bootstrapper(self.skip_native, self.no_cache)?;
        let report = bootstrapper.plan()?;

        if self.json {
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                BootstrapError::ExecutionError(format!("Failed to serialize JSON response: {e}"))
            })?;
            println!("{json}");
        } else {
            println!("Plan for {}:", bootstrapper.workdir().display());
            print_report(&report);
        }
        Ok(0)
    }
}
