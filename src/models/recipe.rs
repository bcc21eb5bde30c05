use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::models::env_flags::EnvFlags;

/// Native libraries the badge application needs at run time: a compiler
/// toolchain for extensions, the OpenGL/EGL loaders, GLib, the X11/XCB/XKB
/// client stack, the USB backend for the label printer and a fallback font.
pub const DEFAULT_NATIVE_PACKAGES: &[&str] = &[
    "build-essential",
    "libgl1",
    "libegl1",
    "libglib2.0-0",
    "libx11-6",
    "libx11-xcb1",
    "libxext6",
    "libxrender1",
    "libxkbcommon0",
    "libxkbcommon-x11-0",
    "libxcb1",
    "libxcb-cursor0",
    "libxcb-icccm4",
    "libxcb-image0",
    "libxcb-keysyms1",
    "libxcb-randr0",
    "libxcb-render-util0",
    "libxcb-shape0",
    "libxcb-xfixes0",
    "libxcb-xinerama0",
    "libfontconfig1",
    "libdbus-1-3",
    "libusb-1.0-0",
    "fonts-dejavu-core",
];

/// Complete description of one bootstrap, usually read from `bootstrap.toml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Recipe {
    pub runtime: RuntimeSection,
    pub environment: EnvFlags,
    pub native: NativeSection,
    pub dependencies: DependencySection,
    pub app: AppSection,
}

/// Interpreter pin and optional virtual environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// Pinned `major.minor` interpreter version
    pub python: String,
    /// Explicit interpreter executable; probed from the pin when absent
    pub interpreter: Option<String>,
    /// Virtual environment path relative to the workdir
    pub venv: Option<String>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            python: "3.12".to_string(),
            interpreter: None,
            venv: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeSection {
    pub enabled: bool,
    pub manager: String,
    pub packages: Vec<String>,
}

impl Default for NativeSection {
    fn default() -> Self {
        Self {
            enabled: true,
            manager: "apt-get".to_string(),
            packages: DEFAULT_NATIVE_PACKAGES.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencySection {
    /// Manifest path relative to the build context
    pub manifest: String,
    /// Requirement the installer is upgraded to before the manifest is installed
    pub installer_baseline: String,
    /// Pass `--no-cache-dir` to the installer
    pub no_cache: bool,
}

impl Default for DependencySection {
    fn default() -> Self {
        Self {
            manifest: "requirements.txt".to_string(),
            installer_baseline: "pip".to_string(),
            no_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    pub workdir: PathBuf,
    pub entry_point: String,
    /// Ignore file in the build context, `.dockerignore` syntax
    pub ignore_file: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("/app"),
            entry_point: "badge_app.py".to_string(),
            ignore_file: ".dockerignore".to_string(),
        }
    }
}

impl Recipe {
    /// Validate the recipe according to bootstrap rules
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_python_pin(&self.runtime.python) {
            return Err(format!(
                "Invalid Python version pin '{}': expected major.minor, e.g. 3.12",
                self.runtime.python
            ));
        }

        if let Some(interpreter) = &self.runtime.interpreter {
            if interpreter.trim().is_empty() {
                return Err("Interpreter cannot be empty".to_string());
            }
        }

        if let Some(venv) = &self.runtime.venv {
            require_relative("Virtual environment path", venv)?;
        }

        self.environment.validate()?;

        if self.native.manager != "apt-get" {
            return Err(format!(
                "Unsupported native package manager '{}': only apt-get is supported",
                self.native.manager
            ));
        }

        require_relative("Manifest path", &self.dependencies.manifest)?;
        if self.dependencies.installer_baseline.trim().is_empty() {
            return Err("Installer baseline cannot be empty".to_string());
        }

        if self.app.workdir.as_os_str().is_empty() {
            return Err("Working directory cannot be empty".to_string());
        }
        require_relative("Entry point", &self.app.entry_point)?;

        Ok(())
    }

    /// Pinned `(major, minor)` pair
    pub fn python_pin(&self) -> Option<(u32, u32)> {
        let (major, minor) = self.runtime.python.split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }
}

fn require_relative(what: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    let path = Path::new(value);
    if path.is_absolute() {
        return Err(format!("{what} must be relative: '{value}'"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("{what} cannot contain '..' references: '{value}'"));
    }
    Ok(())
}

/// `major.minor` with a major version of at least 3
fn is_valid_python_pin(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 2 {
        return false;
    }
    match (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
        (Ok(major), Ok(_)) => major >= 3,
        _ => false,
    }
}
