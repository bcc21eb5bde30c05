// Linear orchestration of the bootstrap steps and the final launch

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::models::layer_cache::{chain_key, BuildState, StateStore, ROOT_KEY};
use crate::models::manifest::Manifest;
use crate::models::recipe::Recipe;
use crate::models::step::{BootstrapReport, Step, StepRecord, StepStatus};
use crate::services::native_installer::NativePackageInstaller;
use crate::services::python_env::{activation_env, InstalledPackage, PythonEnvironmentManager, PythonInfo};
use crate::services::runner::{CommandRunner, Invocation};
use crate::services::source_stager::{absolute, SourceStager};
use crate::utils::error::{BootstrapError, Result};
use crate::utils::validation::validate_python_package_name;

const UNRESOLVED_INTERPRETER: &str = "unresolved";

/// Per-run switches that are not part of the recipe
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Build context holding the manifest and the application source
    pub context: PathBuf,
    /// Report native installation as skipped
    pub skip_native: bool,
    /// Ignore recorded cache keys and run every step
    pub no_cache: bool,
}

struct StepOutcome {
    status: StepStatus,
    key: String,
    detail: String,
}

impl StepOutcome {
    fn new(status: StepStatus, key: String, detail: impl Into<String>) -> Self {
        Self {
            status,
            key,
            detail: detail.into(),
        }
    }
}

/// Runs the provisioning sequence against one context and workdir
pub struct Bootstrapper<R: CommandRunner> {
    recipe: Recipe,
    options: BootstrapOptions,
    runner: R,
    workdir: PathBuf,
    store: StateStore,
    state: BuildState,
    stager: SourceStager,
    staged_manifest: Option<PathBuf>,
    python: Option<PythonInfo>,
}

impl<R: CommandRunner> Bootstrapper<R> {
    pub fn new(recipe: Recipe, mut options: BootstrapOptions, runner: R) -> Result<Self> {
        recipe.validate().map_err(BootstrapError::ConfigError)?;

        options.context = absolute(&options.context);
        let workdir = if recipe.app.workdir.is_absolute() {
            recipe.app.workdir.clone()
        } else {
            options.context.join(&recipe.app.workdir)
        };

        let stager = SourceStager::new(&options.context, &workdir, &recipe.app.ignore_file)?;
        let store = StateStore::for_workdir(&workdir);
        let state = store.load();

        Ok(Self {
            recipe,
            options,
            runner,
            workdir,
            store,
            state,
            stager,
            staged_manifest: None,
            python: None,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Variables every started process receives, the entry point included
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut vars = self.recipe.environment.to_vars();
        if let Some(venv) = &self.recipe.runtime.venv {
            vars.extend(activation_env(&self.workdir.join(venv)));
        }
        vars
    }

    /// Run steps 1 through 7, stopping at the first failure
    pub async fn provision(&mut self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let mut previous = ROOT_KEY.to_string();

        for step in Step::PROVISION {
            tracing::info!(step = %step, number = step.number(), "{}", step.description());
            let started = Instant::now();

            let outcome = match self.run_step(step, &previous).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(step = %step, %err, "step failed");
                    self.state.truncate_from(step);
                    if let Err(save_err) = self.store.save_if_present(&self.state) {
                        tracing::warn!(%save_err, "could not record the failed build");
                    }
                    return Err(err);
                }
            };

            self.state.record(step, outcome.key.clone());
            self.store.save_if_present(&self.state)?;

            if outcome.status == StepStatus::Cached {
                tracing::info!(step = %step, "inputs unchanged, reusing previous result");
            }
            report.push(StepRecord {
                step,
                status: outcome.status,
                cache_key: outcome.key.clone(),
                detail: outcome.detail,
                elapsed: started.elapsed(),
            });
            previous = outcome.key;
        }

        Ok(report)
    }

    /// Compute every key and compare with the recorded build, executing nothing
    pub fn plan(&self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let mut previous = ROOT_KEY.to_string();

        for step in Step::PROVISION {
            let (key, detail, skipped) = match step {
                Step::SetEnvironment => {
                    let input = self.environment_input();
                    (step_key(&previous, step, &input), input.replace('\n', " "), false)
                }
                Step::InstallNativePackages => match self.native_input() {
                    Some(input) => (
                        step_key(&previous, step, &input),
                        format!("{} packages", self.recipe.native.packages.len()),
                        false,
                    ),
                    None => (step_key(&previous, step, "skipped"), "disabled".to_string(), true),
                },
                Step::EnterWorkdir => (
                    step_key(&previous, step, &self.workdir.to_string_lossy()),
                    self.workdir.display().to_string(),
                    false,
                ),
                Step::StageManifest => {
                    let manifest = self.load_manifest()?;
                    (
                        step_key(&previous, step, &manifest.digest()),
                        manifest_detail(&manifest),
                        false,
                    )
                }
                Step::UpgradeInstaller => {
                    let cwd = if self.workdir.is_dir() {
                        self.workdir.as_path()
                    } else {
                        self.stager.context()
                    };
                    let base = self.find_base_interpreter(cwd).ok();
                    let detail = base.as_ref().map_or_else(
                        || UNRESOLVED_INTERPRETER.to_string(),
                        |info| format!("python {} ({})", info.version, info.executable.display()),
                    );
                    (step_key(&previous, step, &self.interpreter_input(base.as_ref())), detail, false)
                }
                Step::InstallDependencies => (
                    step_key(&previous, step, INSTALL_INPUT),
                    self.recipe.dependencies.manifest.clone(),
                    false,
                ),
                Step::CopySource => {
                    let files = self.stager.collect_sources()?;
                    let input = self.source_input(&files)?;
                    (step_key(&previous, step, &input), format!("{} files", files.len()), false)
                }
                Step::Launch => continue,
            };

            let status = if skipped {
                StepStatus::Skipped
            } else if self.cache_hit(step, &key) {
                StepStatus::Cached
            } else {
                StepStatus::Pending
            };
            report.push(StepRecord {
                step,
                status,
                cache_key: key.clone(),
                detail,
                elapsed: Default::default(),
            });
            previous = key;
        }

        Ok(report)
    }

    /// Hand control to the entry point; returns its exit code when the
    /// process could not be replaced
    pub fn launch(&self) -> Result<i32> {
        let entry_point = &self.recipe.app.entry_point;
        self.stager.entry_point(entry_point)?;
        let python = self.resolve_interpreter()?;

        let invocation = Invocation::new(python.to_string_lossy())
            .arg(entry_point.as_str())
            .envs(&self.environment())
            .current_dir(&self.workdir);
        tracing::info!(command = %invocation, workdir = %self.workdir.display(), "launching entry point");
        self.runner.exec(&invocation)
    }

    /// Installed version of a Python package inside the provisioned environment
    pub fn installed_package(&self, name: &str) -> Result<Option<InstalledPackage>> {
        validate_python_package_name(name)?;
        let executable = self.resolve_interpreter()?;
        let version = self
            .python
            .as_ref()
            .map(|p| p.version.clone())
            .unwrap_or_default();
        let python = PythonInfo { executable, version };
        self.python_manager(&self.workdir).show_package(&python, name)
    }

    async fn run_step(&mut self, step: Step, previous: &str) -> Result<StepOutcome> {
        match step {
            Step::SetEnvironment => self.set_environment(previous),
            Step::InstallNativePackages => self.install_native_packages(previous),
            Step::EnterWorkdir => self.enter_workdir(previous).await,
            Step::StageManifest => self.stage_manifest(previous).await,
            Step::UpgradeInstaller => self.upgrade_installer(previous),
            Step::InstallDependencies => self.install_dependencies(previous),
            Step::CopySource => self.copy_source(previous).await,
            Step::Launch => Err(BootstrapError::ExecutionError(
                "launch is not a provisioning step".to_string(),
            )),
        }
    }

    fn set_environment(&self, previous: &str) -> Result<StepOutcome> {
        let input = self.environment_input();
        for line in input.lines() {
            tracing::debug!(variable = line, "environment flag");
        }
        let key = step_key(previous, Step::SetEnvironment, &input);
        Ok(StepOutcome::new(StepStatus::Executed, key, input.replace('\n', " ")))
    }

    fn install_native_packages(&self, previous: &str) -> Result<StepOutcome> {
        let step = Step::InstallNativePackages;
        let Some(input) = self.native_input() else {
            tracing::info!("native package installation disabled");
            let key = step_key(previous, step, "skipped");
            return Ok(StepOutcome::new(StepStatus::Skipped, key, "disabled"));
        };

        let packages = &self.recipe.native.packages;
        let key = step_key(previous, step, &input);
        let detail = format!("{} packages", packages.len());
        if self.cache_hit(step, &key) {
            return Ok(StepOutcome::new(StepStatus::Cached, key, detail));
        }

        NativePackageInstaller::new(&self.runner, &self.recipe.environment.to_vars()).install(packages)?;
        Ok(StepOutcome::new(StepStatus::Executed, key, detail))
    }

    async fn enter_workdir(&self, previous: &str) -> Result<StepOutcome> {
        self.stager.enter_workdir().await?;
        let key = step_key(previous, Step::EnterWorkdir, &self.workdir.to_string_lossy());
        Ok(StepOutcome::new(
            StepStatus::Executed,
            key,
            self.workdir.display().to_string(),
        ))
    }

    async fn stage_manifest(&mut self, previous: &str) -> Result<StepOutcome> {
        let manifest = self.load_manifest()?;
        let staged = self.stager.stage_manifest(&manifest).await?;
        let key = step_key(previous, Step::StageManifest, &manifest.digest());
        tracing::debug!(path = %staged.display(), "manifest staged");
        self.staged_manifest = Some(staged);
        Ok(StepOutcome::new(StepStatus::Executed, key, manifest_detail(&manifest)))
    }

    fn upgrade_installer(&mut self, previous: &str) -> Result<StepOutcome> {
        let step = Step::UpgradeInstaller;
        let base = self.find_base_interpreter(&self.workdir)?;
        let key = step_key(previous, step, &self.interpreter_input(Some(&base)));

        if self.cache_hit(step, &key) {
            if let Some(executable) = self.state.interpreter.clone() {
                let detail = format!("python {} ({})", base.version, executable.display());
                self.python = Some(PythonInfo {
                    executable,
                    version: base.version,
                });
                return Ok(StepOutcome::new(StepStatus::Cached, key, detail));
            }
        }

        let python = {
            let manager = self.python_manager(&self.workdir);
            let python = match &self.recipe.runtime.venv {
                Some(venv) => manager.ensure_venv(&base, &self.workdir.join(venv))?,
                None => base,
            };
            manager.upgrade_installer(
                &python,
                &self.recipe.dependencies.installer_baseline,
                self.recipe.dependencies.no_cache,
            )?;
            python
        };

        let detail = format!(
            "python {} ({}), {}",
            python.version,
            python.executable.display(),
            self.recipe.dependencies.installer_baseline
        );
        self.state.interpreter = Some(python.executable.clone());
        self.python = Some(python);
        Ok(StepOutcome::new(StepStatus::Executed, key, detail))
    }

    fn install_dependencies(&self, previous: &str) -> Result<StepOutcome> {
        let step = Step::InstallDependencies;
        let key = step_key(previous, step, INSTALL_INPUT);
        let detail = self.recipe.dependencies.manifest.clone();
        if self.cache_hit(step, &key) {
            return Ok(StepOutcome::new(StepStatus::Cached, key, detail));
        }

        let (Some(python), Some(staged)) = (&self.python, &self.staged_manifest) else {
            return Err(BootstrapError::ExecutionError(
                "dependencies cannot be installed before the manifest and installer are ready"
                    .to_string(),
            ));
        };
        let relative = staged.strip_prefix(&self.workdir).unwrap_or(staged);
        let output = self.python_manager(&self.workdir).install_manifest(
            python,
            relative,
            self.recipe.dependencies.no_cache,
        )?;
        tracing::debug!(output = %output.trim_end(), "installer output");
        Ok(StepOutcome::new(StepStatus::Executed, key, detail))
    }

    async fn copy_source(&mut self, previous: &str) -> Result<StepOutcome> {
        let step = Step::CopySource;
        let entry_point = self.recipe.app.entry_point.clone();
        let files = self.stager.collect_sources()?;
        let key = step_key(previous, step, &self.source_input(&files)?);

        if self.cache_hit(step, &key) && self.stager.entry_point(&entry_point).is_ok() {
            let detail = format!("{} files", files.len());
            return Ok(StepOutcome::new(StepStatus::Cached, key, detail));
        }

        // Record every file this copy may write before writing any
        let previous_files = self.state.copied_files.clone();
        if !self.stager.is_in_place() {
            let pending: BTreeSet<PathBuf> =
                previous_files.iter().chain(files.iter()).cloned().collect();
            self.state.copied_files = pending.into_iter().collect();
            self.store.save_if_present(&self.state)?;
        }

        let summary = self.stager.copy_sources(&files, &previous_files).await?;
        self.state.copied_files = if summary.in_place { Vec::new() } else { files };
        self.stager.entry_point(&entry_point)?;

        let detail = if summary.in_place {
            "in place".to_string()
        } else {
            format!("{} files copied, {} removed", summary.copied, summary.removed)
        };
        Ok(StepOutcome::new(StepStatus::Executed, key, detail))
    }

    fn cache_hit(&self, step: Step, key: &str) -> bool {
        !self.options.no_cache && step.is_cacheable() && self.state.is_current(step, key)
    }

    fn environment_input(&self) -> String {
        self.recipe
            .environment
            .to_vars()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `None` when native installation is switched off
    fn native_input(&self) -> Option<String> {
        if self.options.skip_native || !self.recipe.native.enabled {
            return None;
        }
        let mut input = self.recipe.native.manager.clone();
        for package in &self.recipe.native.packages {
            input.push('\n');
            input.push_str(package);
        }
        Some(input)
    }

    fn interpreter_input(&self, base: Option<&PythonInfo>) -> String {
        let identity = base.map_or_else(
            || UNRESOLVED_INTERPRETER.to_string(),
            |info| format!("{}\n{}", info.executable.display(), info.version),
        );
        format!(
            "{identity}\nvenv={}\nbaseline={}\nno-cache={}",
            self.recipe.runtime.venv.as_deref().unwrap_or(""),
            self.recipe.dependencies.installer_baseline,
            self.recipe.dependencies.no_cache
        )
    }

    fn source_input(&self, files: &[PathBuf]) -> Result<String> {
        Ok(format!(
            "{}\nentry={}",
            self.stager.digest(files)?,
            self.recipe.app.entry_point
        ))
    }

    /// The manifest as it currently is in the build context
    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.stager.context().join(&self.recipe.dependencies.manifest))
    }

    fn python_manager(&self, cwd: &Path) -> PythonEnvironmentManager<'_> {
        PythonEnvironmentManager::new(&self.runner, &self.environment(), cwd)
    }

    fn find_base_interpreter(&self, cwd: &Path) -> Result<PythonInfo> {
        let pin = self.recipe.python_pin().ok_or_else(|| {
            BootstrapError::ConfigError(format!(
                "Invalid Python version pin '{}'",
                self.recipe.runtime.python
            ))
        })?;
        // Base interpreter is probed without venv activation
        PythonEnvironmentManager::new(&self.runner, &self.recipe.environment.to_vars(), cwd)
            .find_interpreter(pin, self.recipe.runtime.interpreter.as_deref())
    }

    /// Interpreter of the provisioned environment: this run, the recorded
    /// build, or a fresh probe in that order
    fn resolve_interpreter(&self) -> Result<PathBuf> {
        if let Some(python) = &self.python {
            return Ok(python.executable.clone());
        }
        if let Some(recorded) = &self.state.interpreter {
            return Ok(recorded.clone());
        }
        if !self.workdir.is_dir() {
            return Err(BootstrapError::ExecutionError(format!(
                "Working directory {} does not exist; run `bootstrap provision` first",
                self.workdir.display()
            )));
        }
        Ok(self.find_base_interpreter(&self.workdir)?.executable)
    }
}

/// The install step has no inputs of its own; its key is the chain so far
const INSTALL_INPUT: &str = "install -r";

fn step_key(previous: &str, step: Step, input: &str) -> String {
    chain_key(previous, step, &[input.as_bytes()])
}

fn manifest_detail(manifest: &Manifest) -> String {
    format!(
        "{} requirements from {} file(s)",
        manifest.requirements.len(),
        manifest.files.len()
    )
}
