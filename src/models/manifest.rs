// Requirements manifest parsing (requirements.txt format)

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::utils::error::{BootstrapError, Result};

/// A single named requirement such as `flask[async]>=2.0,<3 ; python_version >= "3.8"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    pub extras: Vec<String>,
    /// Comma separated version clauses, parentheses removed
    pub specifier: Option<String>,
    /// Direct reference after `@`
    pub url: Option<String>,
    /// Environment marker after `;`
    pub marker: Option<String>,
    /// Manifest file (relative to the manifest directory) and line it came from
    pub source: PathBuf,
    pub line: usize,
}

impl Requirement {
    /// Name normalized the way package indexes compare names
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Exact version when pinned with `==` and nothing else
    pub fn pinned_version(&self) -> Option<&str> {
        let clauses = self.specifier.as_deref()?;
        if clauses.contains(',') {
            return None;
        }
        let version = clauses.strip_prefix("==")?.trim();
        if version.contains('*') {
            None
        } else {
            Some(version)
        }
    }
}

/// Kind of nested manifest reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `-r` / `--requirement`
    Requirements,
    /// `-c` / `--constraint`
    Constraints,
}

/// One file that belongs to the manifest and has to be staged with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the directory of the root manifest
    pub relative: PathBuf,
    pub kind: IncludeKind,
    pub contents: Vec<u8>,
}

/// Parsed manifest including every file it pulls in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Directory holding the root manifest
    pub base_dir: PathBuf,
    /// Root manifest first, then includes in discovery order
    pub files: Vec<ManifestFile>,
    pub requirements: Vec<Requirement>,
    pub constraints: Vec<Requirement>,
    /// Installer options passed through verbatim (`--index-url ...`, `-e ...`)
    pub options: Vec<String>,
    /// Lines naming an archive, path or URL without a project name
    pub direct_references: Vec<String>,
}

/// One logical line of a manifest after comments and continuations are handled
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Requirement(Requirement),
    Include(IncludeKind, String),
    Option(String),
    Direct(String),
}

impl Manifest {
    /// Load a manifest and everything it includes from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BootstrapError::MissingSource(path.to_path_buf()));
        }

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let file_name = path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| BootstrapError::MissingSource(path.to_path_buf()))?;

        let mut manifest = Self {
            base_dir,
            files: Vec::new(),
            requirements: Vec::new(),
            constraints: Vec::new(),
            options: Vec::new(),
            direct_references: Vec::new(),
        };

        let mut seen_names = HashSet::new();
        let mut stack = Vec::new();
        let mut visited = HashSet::new();
        manifest.load_file(
            file_name,
            IncludeKind::Requirements,
            &mut stack,
            &mut visited,
            &mut seen_names,
        )?;

        Ok(manifest)
    }

    fn load_file(
        &mut self,
        relative: PathBuf,
        kind: IncludeKind,
        stack: &mut Vec<PathBuf>,
        visited: &mut HashSet<PathBuf>,
        seen_names: &mut HashSet<String>,
    ) -> Result<()> {
        if stack.contains(&relative) {
            return Err(BootstrapError::ValidationError(format!(
                "Cyclic manifest include: {}",
                relative.display()
            )));
        }
        if !visited.insert(relative.clone()) {
            return Ok(());
        }

        let absolute = self.base_dir.join(&relative);
        let contents =
            fs::read(&absolute).map_err(|_| BootstrapError::MissingSource(absolute.clone()))?;
        let text = String::from_utf8(contents.clone()).map_err(|_| {
            BootstrapError::ValidationError(format!(
                "{}: manifest is not valid UTF-8",
                relative.display()
            ))
        })?;

        self.files.push(ManifestFile {
            relative: relative.clone(),
            kind,
            contents,
        });

        stack.push(relative.clone());
        for line in parse_lines(&relative, &text)? {
            match line {
                Line::Requirement(req) => {
                    if kind == IncludeKind::Constraints {
                        self.constraints.push(req);
                        continue;
                    }
                    if !seen_names.insert(req.normalized_name()) {
                        return Err(BootstrapError::ValidationError(format!(
                            "{}:{}: duplicate requirement '{}'",
                            req.source.display(),
                            req.line,
                            req.name
                        )));
                    }
                    self.requirements.push(req);
                }
                Line::Include(include_kind, target) => {
                    let nested = resolve_include(&relative, &target)?;
                    // Constraint files never install anything, even through -r.
                    let effective = if kind == IncludeKind::Constraints {
                        IncludeKind::Constraints
                    } else {
                        include_kind
                    };
                    self.load_file(nested, effective, stack, visited, seen_names)?;
                }
                Line::Option(option) => self.options.push(option),
                Line::Direct(reference) => self.direct_references.push(reference),
            }
        }
        stack.pop();

        Ok(())
    }

    /// SHA-256 over every staged file, its relative path included
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&file.contents);
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Path of the root manifest relative to its directory
    pub fn root_file(&self) -> Option<&Path> {
        self.files.first().map(|f| f.relative.as_path())
    }

    /// Look up a requirement by name (index-normalized)
    pub fn requirement(&self, name: &str) -> Option<&Requirement> {
        let wanted = normalize_name(name);
        self.requirements.iter().find(|r| r.normalized_name() == wanted)
    }
}

/// Normalize a project name: lowercase, runs of `-`, `_`, `.` collapse to `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Check a project name against the PEP 508 name grammar
pub fn is_valid_project_name(name: &str) -> bool {
    name_regex().is_match(name)
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i)[a-z0-9](?:[a-z0-9._-]*[a-z0-9])?$").expect("valid name regex")
    })
}

fn requirement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$",
        )
        .expect("valid requirement regex")
    })
}

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(===|~=|==|!=|<=|>=|<|>)\s*[A-Za-z0-9.*+!_-]+$").expect("valid clause regex")
    })
}

fn parse_lines(file: &Path, text: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut pending_start = 0;

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        if pending.is_empty() {
            pending_start = number;
        }

        let content = strip_comment(raw);
        let trimmed_end = content.trim_end();
        if let Some(head) = trimmed_end.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed_end);

        let logical = pending.trim().to_string();
        pending.clear();
        if logical.is_empty() {
            continue;
        }
        lines.push(parse_line(file, pending_start, &logical)?);
    }

    let rest = pending.trim();
    if !rest.is_empty() {
        lines.push(parse_line(file, pending_start, rest)?);
    }

    Ok(lines)
}

/// Drop a `#` comment that starts the line or follows whitespace
fn strip_comment(line: &str) -> &str {
    let mut previous_is_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && previous_is_space {
            return &line[..i];
        }
        previous_is_space = c.is_whitespace();
    }
    line
}

fn parse_line(file: &Path, number: usize, line: &str) -> Result<Line> {
    let invalid = |message: String| {
        BootstrapError::ValidationError(format!("{}:{}: {}", file.display(), number, message))
    };

    if line.starts_with('-') {
        return parse_option(line).map_err(invalid);
    }

    if line.starts_with('.') || line.starts_with('/') {
        return Ok(Line::Direct(line.to_string()));
    }

    let captures = requirement_regex().captures(line);
    let named_url = captures
        .as_ref()
        .and_then(|c| c.name("rest"))
        .is_some_and(|rest| rest.as_str().starts_with('@'));
    if line.contains("://") && !named_url {
        return Ok(Line::Direct(line.to_string()));
    }
    let captures = captures.ok_or_else(|| invalid(format!("invalid requirement '{line}'")))?;

    let name = captures["name"].to_string();
    let extras = match captures.name("extras") {
        Some(extras) => parse_extras(extras.as_str()).map_err(&invalid)?,
        None => Vec::new(),
    };

    let rest = captures.name("rest").map_or("", |m| m.as_str()).trim();
    let (body, marker) = match rest.split_once(';') {
        Some((body, marker)) => {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(invalid("empty environment marker".to_string()));
            }
            (body.trim(), Some(marker.to_string()))
        }
        None => (rest, None),
    };

    let mut specifier = None;
    let mut url = None;
    if let Some(reference) = body.strip_prefix('@') {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(invalid(format!("missing URL after '@' for '{name}'")));
        }
        url = Some(reference.to_string());
    } else if !body.is_empty() {
        specifier = Some(parse_specifier(body).map_err(&invalid)?);
    }

    Ok(Line::Requirement(Requirement {
        name,
        extras,
        specifier,
        url,
        marker,
        source: file.to_path_buf(),
        line: number,
    }))
}

fn parse_option(line: &str) -> std::result::Result<Line, String> {
    let (flag, value) = match line.split_once(|c: char| c == '=' || c.is_whitespace()) {
        Some((flag, value)) => (flag, value.trim()),
        None => (line, ""),
    };

    let include = match flag {
        "-r" | "--requirement" => Some(IncludeKind::Requirements),
        "-c" | "--constraint" => Some(IncludeKind::Constraints),
        _ => None,
    };
    if let Some(kind) = include {
        if value.is_empty() {
            return Err(format!("option '{flag}' requires a file"));
        }
        return Ok(Line::Include(kind, value.to_string()));
    }

    // Attached short form: -rbase.txt
    if let Some(target) = line.strip_prefix("-r").filter(|t| !t.starts_with('-') && !t.is_empty()) {
        return Ok(Line::Include(IncludeKind::Requirements, target.trim().to_string()));
    }
    if let Some(target) = line.strip_prefix("-c").filter(|t| !t.starts_with('-') && !t.is_empty()) {
        return Ok(Line::Include(IncludeKind::Constraints, target.trim().to_string()));
    }

    Ok(Line::Option(line.to_string()))
}

fn parse_extras(raw: &str) -> std::result::Result<Vec<String>, String> {
    let mut extras = Vec::new();
    for extra in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !is_valid_project_name(extra) {
            return Err(format!("invalid extra '{extra}'"));
        }
        extras.push(extra.to_string());
    }
    Ok(extras)
}

fn parse_specifier(raw: &str) -> std::result::Result<String, String> {
    let inner = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(raw);

    let mut clauses = Vec::new();
    for clause in inner.split(',') {
        let clause = clause.trim();
        if !clause_regex().is_match(clause) {
            return Err(format!("invalid version specifier '{raw}'"));
        }
        clauses.push(clause.split_whitespace().collect::<String>());
    }
    Ok(clauses.join(","))
}

/// Resolve an include relative to the including file, keeping it under the manifest directory
fn resolve_include(including: &Path, target: &str) -> Result<PathBuf> {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return Err(BootstrapError::ValidationError(format!(
            "{}: included manifest must be relative: '{}'",
            including.display(),
            target
        )));
    }

    let joined = including
        .parent()
        .map_or_else(|| target_path.to_path_buf(), |parent| parent.join(target_path));

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(BootstrapError::ValidationError(format!(
                        "{}: included manifest escapes the manifest directory: '{}'",
                        including.display(),
                        target
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(normalized)
}
