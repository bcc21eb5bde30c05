use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::services::runner::{CommandRunner, Invocation, InvocationOutput};
use crate::utils::error::{BootstrapError, Result};

const PROBE_SCRIPT: &str =
    "import sys; print(sys.executable); print('.'.join(map(str, sys.version_info[:3])))";

/// Information about a Python installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonInfo {
    /// Path to the Python executable
    pub executable: PathBuf,
    /// Full `major.minor.micro` version
    pub version: String,
}

impl PythonInfo {
    /// `(major, minor)` of the interpreter
    pub fn minor_version(&self) -> Option<(u32, u32)> {
        let mut parts = self.version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some((major, minor))
    }
}

/// Installed package as reported by `pip show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub location: Option<String>,
}

/// Interpreter discovery, virtual environments and pip operations
pub struct PythonEnvironmentManager<'a> {
    runner: &'a dyn CommandRunner,
    env: BTreeMap<String, String>,
    workdir: PathBuf,
}

impl<'a> PythonEnvironmentManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, env: &BTreeMap<String, String>, workdir: &Path) -> Self {
        Self {
            runner,
            env: env.clone(),
            workdir: workdir.to_path_buf(),
        }
    }

    /// Find an interpreter matching the pinned `major.minor`.
    ///
    /// An explicit interpreter is the only candidate; otherwise
    /// `python<pin>`, `python3` and `python` are tried in that order.
    pub fn find_interpreter(&self, pin: (u32, u32), explicit: Option<&str>) -> Result<PythonInfo> {
        let pinned_name = format!("python{}.{}", pin.0, pin.1);
        let candidates: Vec<&str> = match explicit {
            Some(name) => vec![name],
            None => vec![pinned_name.as_str(), "python3", "python"],
        };

        let mut mismatches = Vec::new();
        for candidate in candidates {
            let Ok(info) = self.probe(candidate) else {
                tracing::debug!(candidate, "interpreter not usable");
                continue;
            };
            if info.minor_version() == Some(pin) {
                tracing::info!(
                    executable = %info.executable.display(),
                    version = %info.version,
                    "found interpreter"
                );
                return Ok(info);
            }
            mismatches.push(format!("{candidate} ({})", info.version));
        }

        let found = if mismatches.is_empty() {
            "none found".to_string()
        } else {
            format!("found {}", mismatches.join(", "))
        };
        Err(BootstrapError::ValidationError(format!(
            "Python {}.{} is required but {found}",
            pin.0, pin.1
        )))
    }

    /// Ask an interpreter for its executable path and version
    pub fn probe(&self, program: &str) -> Result<PythonInfo> {
        let output = self.run(Invocation::new(program).args(["-c", PROBE_SCRIPT]))?;
        if !output.is_success() {
            return Err(BootstrapError::ExecutionError(format!(
                "Invalid Python executable: {program}"
            )));
        }

        let mut lines = output.stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        let executable = lines.next().map(PathBuf::from);
        let version = lines.next().map(ToString::to_string);
        match (executable, version) {
            (Some(executable), Some(version)) => Ok(PythonInfo { executable, version }),
            _ => Err(BootstrapError::ExecutionError(format!(
                "Unexpected interpreter probe output from {program}"
            ))),
        }
    }

    /// Create (or reuse) a virtual environment and return its interpreter
    pub fn ensure_venv(&self, base: &PythonInfo, venv_path: &Path) -> Result<PythonInfo> {
        let python = venv_python(venv_path);
        if python.is_file() {
            tracing::info!(path = %venv_path.display(), "reusing virtual environment");
        } else {
            tracing::info!(path = %venv_path.display(), "creating virtual environment");
            let output = self.run(
                Invocation::new(base.executable.to_string_lossy())
                    .args(["-m", "venv"])
                    .arg(venv_path.to_string_lossy()),
            )?;
            if !output.is_success() {
                return Err(BootstrapError::DependencyError(format!(
                    "Virtual environment creation failed: {}",
                    output.failure_summary()
                )));
            }
        }

        Ok(PythonInfo {
            executable: python,
            version: base.version.clone(),
        })
    }

    /// Upgrade the installer itself to the baseline requirement
    pub fn upgrade_installer(&self, python: &PythonInfo, baseline: &str, no_cache: bool) -> Result<()> {
        tracing::info!(baseline, "upgrading installer");
        let invocation = pip(python, no_cache, &["install", "--upgrade"]).arg(baseline);
        let output = self.run(invocation)?;
        if output.is_success() {
            Ok(())
        } else {
            Err(BootstrapError::DependencyError(format!(
                "Installer upgrade to '{baseline}' failed: {}",
                output.failure_summary()
            )))
        }
    }

    /// Install every requirement of a staged manifest
    pub fn install_manifest(&self, python: &PythonInfo, manifest: &Path, no_cache: bool) -> Result<String> {
        tracing::info!(manifest = %manifest.display(), "installing dependencies");
        let invocation = pip(python, no_cache, &["install", "-r"]).arg(manifest.to_string_lossy());
        let output = self.run(invocation)?;
        if output.is_success() {
            Ok(output.stdout)
        } else {
            Err(BootstrapError::DependencyError(format!(
                "Could not install {}: {}",
                manifest.display(),
                output.failure_summary()
            )))
        }
    }

    /// Look up an installed distribution; `None` when it is not installed
    pub fn show_package(&self, python: &PythonInfo, name: &str) -> Result<Option<InstalledPackage>> {
        let output = self.run(pip(python, false, &["show"]).arg(name))?;
        if !output.is_success() {
            return Ok(None);
        }
        Ok(parse_show_output(&output.stdout))
    }

    fn run(&self, invocation: Invocation) -> Result<InvocationOutput> {
        self.runner
            .run(&invocation.envs(&self.env).current_dir(&self.workdir))
    }
}

/// Path of the interpreter inside a virtual environment
pub fn venv_python(venv_path: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_path.join("Scripts").join("python.exe")
    } else {
        venv_path.join("bin").join("python")
    }
}

/// Variables that activate a virtual environment for child processes
pub fn activation_env(venv_path: &Path) -> BTreeMap<String, String> {
    let mut env_vars = BTreeMap::new();
    env_vars.insert(
        "VIRTUAL_ENV".to_string(),
        venv_path.to_string_lossy().to_string(),
    );

    let scripts_path = if cfg!(windows) {
        venv_path.join("Scripts")
    } else {
        venv_path.join("bin")
    };
    let separator = if cfg!(windows) { ";" } else { ":" };
    let path = match std::env::var("PATH") {
        Ok(current) if !current.is_empty() => {
            format!("{}{separator}{current}", scripts_path.to_string_lossy())
        }
        _ => scripts_path.to_string_lossy().to_string(),
    };
    env_vars.insert("PATH".to_string(), path);
    env_vars
}

fn pip(python: &PythonInfo, no_cache: bool, args: &[&str]) -> Invocation {
    let mut invocation = Invocation::new(python.executable.to_string_lossy())
        .args(["-m", "pip", "--disable-pip-version-check"]);
    if no_cache {
        invocation = invocation.arg("--no-cache-dir");
    }
    invocation.args(args.iter().copied())
}

fn parse_show_output(stdout: &str) -> Option<InstalledPackage> {
    let mut name = None;
    let mut version = None;
    let mut location = None;
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "Name" => name = Some(value),
            "Version" => version = Some(value),
            "Location" => location = Some(value),
            _ => {}
        }
    }
    Some(InstalledPackage {
        name: name?,
        version: version?,
        location,
    })
}
