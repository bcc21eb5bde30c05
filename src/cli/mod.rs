// CLI module for command-line interface

pub mod env;
pub mod launch;
pub mod plan;
pub mod provision;
pub mod show;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::models::recipe::Recipe;
use crate::services::bootstrapper::{BootstrapOptions, Bootstrapper};
use crate::services::runner::SystemRunner;
use crate::utils::config::ConfigParser;
use crate::utils::error::Result;

use self::env::EnvCommand;
use self::launch::LaunchCommand;
use self::plan::PlanCommand;
use self::provision::ProvisionCommand;
use self::show::ShowCommand;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "bootstrap")]
#[command(about = "Provision the badge application runtime and launch its entry point")]
#[command(long_about = r#"bootstrap prepares a reproducible runtime for badge_app.py and hands
control to it.

Provisioning runs a fixed sequence of steps:
  1. set PYTHONDONTWRITEBYTECODE and PYTHONUNBUFFERED
  2. install native GUI libraries with apt-get
  3. create the working directory
  4. stage the requirements manifest on its own
  5. verify the pinned interpreter and upgrade pip
  6. install the manifest
  7. copy the application source
Launching replaces this process with `python badge_app.py`.

Unchanged steps are reused from the previous build.

Examples:
  bootstrap up                          Provision and launch
  bootstrap provision --skip-native     Provision without apt-get
  bootstrap plan                        Show which steps would run
  bootstrap show flask                  Installed version of a package"#)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (BOOTSTRAP_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the recipe, the build context and the working directory come from
#[derive(Debug, Clone, Args)]
pub struct RecipeArgs {
    /// Build context holding the manifest and the application source
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Recipe file (default: <context>/bootstrap.toml, or built-in defaults)
    #[arg(long)]
    pub recipe: Option<PathBuf>,

    /// Working directory override
    #[arg(long, env = "BOOTSTRAP_WORKDIR")]
    pub workdir: Option<PathBuf>,
}

impl RecipeArgs {
    pub fn load(&self) -> Result<Recipe> {
        ConfigParser::resolve(&self.context, self.recipe.as_deref(), self.workdir.as_deref())
    }

    /// Bootstrapper over the real host
    pub fn bootstrapper(&self, skip_native: bool, no_cache: bool) -> Result<Bootstrapper<SystemRunner>> {
        let options = BootstrapOptions {
            context: self.context.clone(),
            skip_native,
            no_cache,
        };
        Bootstrapper::new(self.load()?, options, SystemRunner)
    }
}

/// All available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run provisioning steps 1-7
    #[command(long_about = r#"Run the provisioning steps without launching.

Any failing step aborts the run with a non-zero exit code. Steps whose
inputs are unchanged since the last successful build are reported as
cached and not executed.

Examples:
  bootstrap provision
  bootstrap provision --context ./badge --workdir /app
  bootstrap provision --no-cache --json"#)]
    Provision(ProvisionCommand),

    /// Launch the entry point of a provisioned environment
    Launch(LaunchCommand),

    /// Provision, then launch the entry point
    Up(ProvisionCommand),

    /// Show every step with its cache status without executing anything
    Plan(PlanCommand),

    /// Print the environment every started process receives
    Env(EnvCommand),

    /// Show the installed version of a Python package
    Show(ShowCommand),
}

/// CLI command dispatcher
pub struct CliDispatcher;

impl CliDispatcher {
    /// Execute a CLI command; the result is the process exit code
    pub async fn execute(command: Commands) -> Result<i32> {
        match command {
            Commands::Provision(cmd) => cmd.run(false).await,
            Commands::Up(cmd) => cmd.run(true).await,
            Commands::Launch(cmd) => cmd.run(),
            Commands::Plan(cmd) => cmd.run(),
            Commands::Env(cmd) => cmd.run(),
            Commands::Show(cmd) => cmd.run(),
        }
    }
}
