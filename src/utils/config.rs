// Recipe loading and TOML parsing

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::recipe::Recipe;
use crate::utils::error::{BootstrapError, Result};

/// Recipe file looked up in the build context when `--recipe` is not given
pub const RECIPE_FILE: &str = "bootstrap.toml";

/// Recipe parsing and validation utilities
pub struct ConfigParser;

impl ConfigParser {
    /// Load and validate a recipe from a TOML file
    pub fn load_recipe<P: AsRef<Path>>(path: P) -> Result<Recipe> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BootstrapError::ConfigError(format!(
                "Recipe file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            BootstrapError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_recipe(&content)
            .map_err(|e| BootstrapError::ConfigError(format!("{}: {}", path.display(), strip_kind(&e))))
    }

    /// Parse a recipe from a TOML string; missing sections take their defaults
    pub fn parse_recipe(content: &str) -> Result<Recipe> {
        let recipe: Recipe = toml::from_str(content)
            .map_err(|e| BootstrapError::ConfigError(format!("Invalid TOML syntax: {e}")))?;

        recipe.validate().map_err(BootstrapError::ConfigError)?;

        Ok(recipe)
    }

    /// Resolve the recipe for a run.
    ///
    /// An explicit path must exist. Otherwise `bootstrap.toml` in the context
    /// is used when present, and the built-in defaults when it is not. The
    /// workdir override replaces whatever the recipe says.
    pub fn resolve(
        context: &Path,
        explicit: Option<&Path>,
        workdir_override: Option<&Path>,
    ) -> Result<Recipe> {
        let mut recipe = match explicit {
            Some(path) => Self::load_recipe(path)?,
            None => {
                let default_path = context.join(RECIPE_FILE);
                if default_path.is_file() {
                    Self::load_recipe(&default_path)?
                } else {
                    tracing::debug!(context = %context.display(), "no recipe file, using defaults");
                    Recipe::default()
                }
            }
        };

        if let Some(workdir) = workdir_override {
            recipe.app.workdir = PathBuf::from(workdir);
            recipe.validate().map_err(BootstrapError::ConfigError)?;
        }

        Ok(recipe)
    }
}

fn strip_kind(err: &BootstrapError) -> String {
    match err {
        BootstrapError::ConfigError(message) => message.clone(),
        other => other.to_string(),
    }
}
