// Process execution seam used by every provisioning step

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::utils::error::{BootstrapError, Result};

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(&self.env);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last few lines of stderr (or stdout when stderr is empty)
    pub fn failure_summary(&self) -> String {
        const TAIL: usize = 8;
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(TAIL);
        let tail = lines[start..].join("\n");
        let status = self
            .code
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"));
        if tail.is_empty() {
            status
        } else {
            format!("{status}\n{tail}")
        }
    }
}

/// Runs external commands on behalf of the bootstrapper
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output
    fn run(&self, invocation: &Invocation) -> Result<InvocationOutput>;

    /// Hand the foreground over to the command.
    ///
    /// On Unix the current process image is replaced and this only returns on
    /// failure; elsewhere the child is awaited and its exit code returned.
    fn exec(&self, invocation: &Invocation) -> Result<i32>;
}

/// [`CommandRunner`] backed by `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn_error(invocation: &Invocation, err: &std::io::Error) -> BootstrapError {
        if err.kind() == ErrorKind::NotFound {
            BootstrapError::ExecutionError(format!("Command not found: {}", invocation.program))
        } else {
            BootstrapError::ExecutionError(format!("Failed to run '{invocation}': {err}"))
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<InvocationOutput> {
        tracing::debug!(command = %invocation, "running");
        let output = invocation
            .to_command()
            .output()
            .map_err(|e| Self::spawn_error(invocation, &e))?;

        let result = InvocationOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        for line in result.stdout.lines() {
            tracing::trace!(target: "bootstrap::child", "{line}");
        }
        Ok(result)
    }

    #[cfg(unix)]
    fn exec(&self, invocation: &Invocation) -> Result<i32> {
        use std::os::unix::process::CommandExt;

        tracing::debug!(command = %invocation, "exec");
        let err = invocation.to_command().exec();
        Err(Self::spawn_error(invocation, &err))
    }

    #[cfg(not(unix))]
    fn exec(&self, invocation: &Invocation) -> Result<i32> {
        tracing::debug!(command = %invocation, "spawning foreground process");
        let status = invocation
            .to_command()
            .status()
            .map_err(|e| Self::spawn_error(invocation, &e))?;
        Ok(status.code().unwrap_or(1))
    }
}
