// Env command implementation

use clap::Args;

use crate::cli::RecipeArgs;
use crate::utils::error::{BootstrapError, Result};

#[derive(Debug, Args)]
pub struct EnvCommand {
    #[command(flatten)]
    pub recipe: RecipeArgs,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EnvCommand {
    pub fn run(&self) -> Result<i32> {
        let env_vars = self.recipe.bootstrapper(false, false)?.environment();

        if self.json {
            let json = serde_json::to_string_pretty(&env_vars).map_err(|e| {
                BootstrapError::ExecutionError(format!("Failed to serialize JSON response: {e}"))
            })?;
            println!("{json}");
        } else {
            for (key, value) in &env_vars {
                println!("{key}={value}");
            }
        }
        Ok(0)
    }
}
