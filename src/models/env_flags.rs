use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variable that stops the interpreter from writing `.pyc` files.
pub const DONT_WRITE_BYTECODE: &str = "PYTHONDONTWRITEBYTECODE";
/// Variable that disables stdout/stderr buffering.
pub const UNBUFFERED: &str = "PYTHONUNBUFFERED";

/// Process-wide environment applied to every process the bootstrapper starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvFlags {
    /// Suppress compiled bytecode artifacts
    pub dont_write_bytecode: bool,
    /// Flush standard streams immediately
    pub unbuffered: bool,
    /// Additional variables set alongside the flags
    pub extra: BTreeMap<String, String>,
}

impl Default for EnvFlags {
    fn default() -> Self {
        Self {
            dont_write_bytecode: true,
            unbuffered: true,
            extra: BTreeMap::new(),
        }
    }
}

impl EnvFlags {
    /// Resolve the flags into concrete key/value pairs.
    ///
    /// Ordered so that cache keys computed over the result are stable.
    pub fn to_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.extra.clone();
        if self.dont_write_bytecode {
            vars.insert(DONT_WRITE_BYTECODE.to_string(), "1".to_string());
        }
        if self.unbuffered {
            vars.insert(UNBUFFERED.to_string(), "1".to_string());
        }
        vars
    }

    /// Validate variable names
    pub fn validate(&self) -> Result<(), String> {
        for key in self.extra.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(format!("Invalid environment variable name: '{key}'"));
            }
        }
        Ok(())
    }
}
