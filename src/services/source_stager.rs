// Working directory, manifest staging and application source copy

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::models::layer_cache::STATE_DIR;
use crate::models::manifest::Manifest;
use crate::utils::error::{BootstrapError, Result};

/// Compiled `.dockerignore`-style rules; the last matching rule wins
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Regex,
    negated: bool,
}

impl IgnoreRules {
    /// Load rules from a file; a missing file yields no rules
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let pattern = pattern
                .trim_start_matches("./")
                .trim_start_matches('/')
                .trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }
            let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
                BootstrapError::ConfigError(format!("Invalid ignore pattern '{line}': {e}"))
            })?;
            rules.push(IgnoreRule {
                pattern: regex,
                negated,
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn has_negations(&self) -> bool {
        self.rules.iter().any(|r| r.negated)
    }

    /// Whether a context-relative path (or one of its parents) is excluded
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let candidates = ancestors_as_strings(relative);
        let mut ignored = false;
        for rule in &self.rules {
            if candidates.iter().any(|c| rule.pattern.is_match(c)) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

/// `a/b/c` -> `["a", "a/b", "a/b/c"]`, always `/`-separated
fn ancestors_as_strings(relative: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(&part.to_string_lossy());
            out.push(current.clone());
        }
    }
    out
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    regex.push('$');
    regex
}

/// Result of copying the source tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub copied: usize,
    pub removed: usize,
    /// Context and workdir are the same directory; nothing was copied
    pub in_place: bool,
}

/// Moves inputs from the build context into the working directory
#[derive(Debug, Clone)]
pub struct SourceStager {
    context: PathBuf,
    workdir: PathBuf,
    rules: IgnoreRules,
}

impl SourceStager {
    pub fn new(context: &Path, workdir: &Path, ignore_file: &str) -> Result<Self> {
        if !context.is_dir() {
            return Err(BootstrapError::MissingSource(context.to_path_buf()));
        }
        let rules = IgnoreRules::load(&context.join(ignore_file))?;
        if rules.is_empty() {
            tracing::debug!(ignore_file, "no ignore rules, copying the whole context");
        }
        Ok(Self {
            context: context.to_path_buf(),
            workdir: workdir.to_path_buf(),
            rules,
        })
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Directory that holds the staged manifest, outside the copied source
    pub fn manifest_dir(&self) -> PathBuf {
        self.workdir.join(STATE_DIR).join("manifest")
    }

    pub async fn enter_workdir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.workdir).await?;
        tracing::info!(workdir = %self.workdir.display(), "working directory ready");
        Ok(())
    }

    /// Copy only the manifest files; returns the staged root manifest path
    pub async fn stage_manifest(&self, manifest: &Manifest) -> Result<PathBuf> {
        let target = self.manifest_dir();
        if tokio::fs::metadata(&target).await.is_ok() {
            tokio::fs::remove_dir_all(&target).await?;
        }

        for file in &manifest.files {
            let destination = target.join(&file.relative);
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&destination, &file.contents).await?;
        }

        let root = manifest
            .root_file()
            .ok_or_else(|| BootstrapError::ValidationError("Manifest has no files".to_string()))?;
        tracing::info!(files = manifest.files.len(), "manifest staged");
        Ok(target.join(root))
    }

    /// Whether the context is itself the workdir
    pub fn is_in_place(&self) -> bool {
        match (self.context.canonicalize(), self.workdir.canonicalize()) {
            (Ok(context), Ok(workdir)) => context == workdir,
            _ => false,
        }
    }

    /// Workdir location relative to the context when it is nested inside it
    fn nested_workdir(&self) -> Option<PathBuf> {
        let context = self.context.canonicalize().ok()?;
        let workdir = self
            .workdir
            .canonicalize()
            .unwrap_or_else(|_| absolute(&self.workdir));
        workdir
            .strip_prefix(&context)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Every context-relative file that belongs to the application source, sorted
    pub fn collect_sources(&self) -> Result<Vec<PathBuf>> {
        let nested = self.nested_workdir();
        let mut files = Vec::new();
        self.walk(&self.context, Path::new(""), nested.as_deref(), &mut files)?;
        files.sort();
        Ok(files)
    }

    fn walk(&self, dir: &Path, relative: &Path, nested: Option<&Path>, out: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(fs::DirEntry::file_name);

        for entry in entries {
            let rel = relative.join(entry.file_name());
            if rel == Path::new(STATE_DIR) || nested == Some(rel.as_path()) {
                continue;
            }

            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(path = %rel.display(), %err, "skipping unreadable entry");
                    continue;
                }
            };

            if metadata.is_dir() {
                // Negated rules may re-include files below an excluded directory.
                if self.rules.is_ignored(&rel) && !self.rules.has_negations() {
                    continue;
                }
                self.walk(&entry.path(), &rel, nested, out)?;
            } else if metadata.is_file() && !self.rules.is_ignored(&rel) {
                out.push(rel);
            }
        }
        Ok(())
    }

    /// SHA-256 over relative paths and contents
    pub fn digest(&self, files: &[PathBuf]) -> Result<String> {
        let mut hasher = Sha256::new();
        for file in files {
            hasher.update(ancestors_as_strings(file).last().map_or("", String::as_str).as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(self.context.join(file))?);
            hasher.update([0u8]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Copy `files` into the workdir and delete what an earlier copy left behind
    pub async fn copy_sources(&self, files: &[PathBuf], previous: &[PathBuf]) -> Result<CopySummary> {
        if self.is_in_place() {
            tracing::info!("context is the working directory, nothing to copy");
            return Ok(CopySummary {
                in_place: true,
                ..CopySummary::default()
            });
        }

        for file in files {
            let destination = self.workdir.join(file);
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(self.context.join(file), &destination).await?;
        }

        let current: HashSet<&PathBuf> = files.iter().collect();
        let mut removed = 0;
        for stale in previous.iter().filter(|p| !current.contains(p)) {
            match tokio::fs::remove_file(self.workdir.join(stale)).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(copied = files.len(), removed, "application source copied");
        Ok(CopySummary {
            copied: files.len(),
            removed,
            in_place: false,
        })
    }

    /// The entry point inside the workdir, which must exist
    pub fn entry_point(&self, entry_point: &str) -> Result<PathBuf> {
        let path = self.workdir.join(entry_point);
        if path.is_file() {
            Ok(path)
        } else {
            Err(BootstrapError::MissingSource(path))
        }
    }
}

/// Make a path absolute against the current directory without touching the filesystem
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
