// Launch command implementation

use clap::Args;

use crate::cli::RecipeArgs;
use crate::utils::error::Result;

#[derive(Debug, Args)]
pub struct LaunchCommand {
    #[command(flatten)]
    pub recipe: RecipeArgs,
}

impl LaunchCommand {
    /// Replace this process with the entry point. Returns only when the
    /// platform cannot replace processes, with the entry point's exit code.
    pub fn run(&self) -> Result<i32> {
        self.recipe.bootstrapper(false, false)?.launch()
    }
}
