// Recording stand-in for apt-get and a Python 3.12 interpreter

use badge_bootstrap::utils::error::Result;
use badge_bootstrap::{BootstrapOptions, CommandRunner, Invocation, InvocationOutput, Recipe};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const PYTHON: &str = "/usr/bin/python3.12";

/// Answers probes, "installs" pinned requirements and remembers every call
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    installed: Mutex<BTreeMap<String, String>>,
    /// Invocations whose rendered command line contains the marker fail
    failures: Vec<(String, String)>,
}

impl RecordingRunner {
    pub fn failing_on(marker: &str, stderr: &str) -> Self {
        Self {
            failures: vec![(marker.to_string(), stderr.to_string())],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    fn install_manifest(&self, invocation: &Invocation) {
        let Some(position) = invocation.args.iter().position(|a| a == "-r") else {
            return;
        };
        let manifest = Path::new(&invocation.args[position + 1]);
        let path = match &invocation.cwd {
            Some(cwd) => cwd.join(manifest),
            None => manifest.to_path_buf(),
        };
        let content = fs::read_to_string(path).unwrap_or_default();
        let mut installed = self.installed.lock().unwrap();
        for line in content.lines() {
            if let Some((name, version)) = line.trim().split_once("==") {
                installed.insert(name.trim().to_lowercase(), version.trim().to_string());
            }
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<InvocationOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = invocation.to_string();

        for (marker, stderr) in &self.failures {
            if line.contains(marker.as_str()) {
                return Ok(InvocationOutput::failure(1, stderr.clone()));
            }
        }

        if invocation.args.first().map(String::as_str) == Some("-c") {
            return Ok(InvocationOutput::success(format!(
                "{}\n3.12.4\n",
                probed_executable(invocation).display()
            )));
        }
        if let Some(venv) = venv_target(invocation) {
            let python = venv.join("bin").join("python");
            fs::create_dir_all(python.parent().unwrap()).unwrap();
            fs::write(python, "").unwrap();
        }
        if line.contains(" install -r ") {
            self.install_manifest(invocation);
        }
        if let Some(name) = line.strip_prefix(&format!("{PYTHON} -m pip --disable-pip-version-check show ")) {
            return Ok(match self.installed.lock().unwrap().get(&name.to_lowercase()) {
                Some(version) => InvocationOutput::success(format!(
                    "Name: {name}\nVersion: {version}\nLocation: /usr/local/lib/python3.12/site-packages\n"
                )),
                None => InvocationOutput::failure(1, format!("WARNING: Package(s) not found: {name}")),
            });
        }
        Ok(InvocationOutput::success(""))
    }

    fn exec(&self, invocation: &Invocation) -> Result<i32> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok(0)
    }
}

/// An activated venv shadows the system interpreter once it exists
fn probed_executable(invocation: &Invocation) -> PathBuf {
    if let Some(venv) = invocation.env.get("VIRTUAL_ENV") {
        let python = Path::new(venv).join("bin").join("python");
        if python.is_file() {
            return python;
        }
    }
    PathBuf::from(PYTHON)
}

/// Target of `<python> -m venv <path>`
fn venv_target(invocation: &Invocation) -> Option<PathBuf> {
    match invocation.args.as_slice() {
        [m, venv, path] if m == "-m" && venv == "venv" => Some(PathBuf::from(path)),
        _ => None,
    }
}

/// A build context with the badge app and a one-line manifest, plus a
/// separate directory the workdir goes into
pub struct Fixture {
    pub context: TempDir,
    pub output: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            context: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
        };
        fixture.write("badge_app.py", "print('badge')\n");
        fixture.write("requirements.txt", "flask==2.0.0\n");
        fixture.write(".dockerignore", "__pycache__\n*.pyc\n");
        fixture
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.context.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn workdir(&self) -> PathBuf {
        self.output.path().join("app")
    }

    pub fn recipe(&self) -> Recipe {
        let mut recipe = Recipe::default();
        recipe.native.packages = vec!["libgl1".to_string(), "libglib2.0-0".to_string()];
        recipe.app.workdir = self.workdir();
        recipe
    }

    pub fn options(&self) -> BootstrapOptions {
        BootstrapOptions {
            context: self.context.path().to_path_buf(),
            ..BootstrapOptions::default()
        }
    }
}
