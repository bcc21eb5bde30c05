use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The bootstrap steps, in the only order they may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    SetEnvironment,
    InstallNativePackages,
    EnterWorkdir,
    StageManifest,
    UpgradeInstaller,
    InstallDependencies,
    CopySource,
    Launch,
}

impl Step {
    /// Build-time steps; `Launch` only happens when the environment starts
    pub const PROVISION: [Self; 7] = [
        Self::SetEnvironment,
        Self::InstallNativePackages,
        Self::EnterWorkdir,
        Self::StageManifest,
        Self::UpgradeInstaller,
        Self::InstallDependencies,
        Self::CopySource,
    ];

    /// 1-based position in the sequence
    pub const fn number(self) -> usize {
        self as usize + 1
    }

    /// Whether a matching cache key lets this step be skipped
    pub const fn is_cacheable(self) -> bool {
        matches!(
            self,
            Self::InstallNativePackages
                | Self::UpgradeInstaller
                | Self::InstallDependencies
                | Self::CopySource
        )
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::SetEnvironment => "set process-wide environment flags",
            Self::InstallNativePackages => "install native system packages",
            Self::EnterWorkdir => "establish working directory",
            Self::StageManifest => "stage dependency manifest",
            Self::UpgradeInstaller => "upgrade package installer",
            Self::InstallDependencies => "install manifest dependencies",
            Self::CopySource => "copy application source",
            Self::Launch => "launch entry point",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetEnvironment => "set-environment",
            Self::InstallNativePackages => "install-native-packages",
            Self::EnterWorkdir => "enter-workdir",
            Self::StageManifest => "stage-manifest",
            Self::UpgradeInstaller => "upgrade-installer",
            Self::InstallDependencies => "install-dependencies",
            Self::CopySource => "copy-source",
            Self::Launch => "launch",
        };
        write!(f, "{name}")
    }
}

/// What happened to a step in a run (or would happen, for a plan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// Ran to completion
    Executed,
    /// Inputs unchanged since the last build
    Cached,
    /// Disabled by the recipe or a flag
    Skipped,
    /// Not run yet
    Pending,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Executed => "done",
            Self::Cached => "cached",
            Self::Skipped => "skipped",
            Self::Pending => "pending",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    pub cache_key: String,
    /// Short human summary (package count, files copied, ...)
    pub detail: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Outcome of a provisioning run or plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub steps: Vec<StepRecord>,
}

impl BootstrapReport {
    pub fn push(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| r.status)
    }

    pub fn executed(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps
            .iter()
            .filter(|r| r.status == StepStatus::Executed)
            .map(|r| r.step)
    }

    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|r| r.elapsed).sum()
    }
}
