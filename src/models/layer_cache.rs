// Step cache keys and the persisted build state

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::step::Step;
use crate::utils::error::{BootstrapError, Result};

/// Directory inside the workdir that holds bootstrap bookkeeping
pub const STATE_DIR: &str = ".bootstrap";
const STATE_FILE: &str = "state.json";
const STATE_VERSION: u32 = 1;

/// Key of the empty chain, before any step contributed
pub const ROOT_KEY: &str = "";

/// Chain a step's inputs onto the key of the step before it
pub fn chain_key(previous: &str, step: Step, inputs: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    hasher.update([0u8]);
    hasher.update(step.to_string().as_bytes());
    for input in inputs {
        hasher.update([0u8]);
        hasher.update((input.len() as u64).to_le_bytes());
        hasher.update(input);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub step: Step,
    pub key: String,
}

/// What the previous successful steps left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub version: u32,
    /// Keys of completed steps, in step order
    pub layers: Vec<LayerEntry>,
    /// Interpreter resolved during the installer upgrade
    pub interpreter: Option<PathBuf>,
    /// Files written by the last source copy, relative to the workdir
    pub copied_files: Vec<PathBuf>,
    /// RFC 3339 timestamp of the last update
    pub updated_at: String,
}

impl Default for BuildState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            layers: Vec::new(),
            interpreter: None,
            copied_files: Vec::new(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

impl BuildState {
    pub fn key_for(&self, step: Step) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.step == step)
            .map(|l| l.key.as_str())
    }

    /// Whether `step` completed before with exactly this key
    pub fn is_current(&self, step: Step, key: &str) -> bool {
        self.key_for(step) == Some(key)
    }

    /// Record a completed step; everything recorded after it is stale
    pub fn record(&mut self, step: Step, key: String) {
        self.layers.retain(|l| l.step < step);
        self.layers.push(LayerEntry { step, key });
        self.updated_at = Utc::now().to_rfc3339();
    }

    /// Forget `step` and every later step after a failure
    pub fn truncate_from(&mut self, step: Step) {
        self.layers.retain(|l| l.step < step);
        if step <= Step::UpgradeInstaller {
            self.interpreter = None;
        }
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Reads and writes `<workdir>/.bootstrap/state.json`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn for_workdir(workdir: &Path) -> Self {
        Self {
            path: workdir.join(STATE_DIR).join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state; a missing or unreadable file means nothing is cached
    pub fn load(&self) -> BuildState {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return BuildState::default();
        };

        match serde_json::from_str::<BuildState>(&content) {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                tracing::warn!(
                    version = state.version,
                    "ignoring build state written by an incompatible version"
                );
                BuildState::default()
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring corrupt build state");
                BuildState::default()
            }
        }
    }

    /// Persist the state; the workdir itself has to exist already
    pub fn save(&self, state: &BuildState) -> Result<()> {
        let state_dir = self
            .path
            .parent()
            .ok_or_else(|| BootstrapError::ConfigError("Invalid state path".to_string()))?;
        let workdir = state_dir.parent().unwrap_or(state_dir);
        if !workdir.is_dir() {
            return Err(BootstrapError::ConfigError(format!(
                "Working directory does not exist: {}",
                workdir.display()
            )));
        }

        fs::create_dir_all(state_dir)?;
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Save only when the workdir already exists
    pub fn save_if_present(&self, state: &BuildState) -> Result<bool> {
        let exists = self
            .path
            .parent()
            .and_then(Path::parent)
            .is_some_and(Path::is_dir);
        if exists {
            self.save(state)?;
        }
        Ok(exists)
    }
}
