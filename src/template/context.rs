//! Context files exposed to templates as `context`.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use serde::Serialize;
use tracing::debug;

/// A file attached to a template run. Templates see `filename` and
/// `content` on each entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFile {
    pub filename: String,
    pub content: String,
}

impl ContextFile {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, ContextError> {
        let content = std::fs::read_to_string(path).map_err(|source| ContextError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), content))
    }
}

/// Everything a run is handed besides the template itself.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub context: Vec<ContextFile>,
    pub inputs: Vec<String>,
}

impl RunContext {
    pub fn new(context: Vec<ContextFile>, inputs: Vec<String>) -> Self {
        Self { context, inputs }
    }
}

#[derive(Debug)]
pub enum ContextError {
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    Read {
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Pattern { pattern, source } => {
                write!(f, "invalid context pattern '{pattern}': {source}")
            }
            ContextError::Read { path, source } => {
                write!(f, "failed to read context file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContextError::Pattern { source, .. } => Some(source),
            ContextError::Read { source, .. } => Some(source),
        }
    }
}

fn is_glob_component(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Loads every file matched by `pattern`, sorted by path.
///
/// A pattern naming a directory loads every file beneath it. A pattern that
/// matches nothing yields an empty list.
pub fn load_glob(pattern: &str) -> Result<Vec<ContextFile>, ContextError> {
    let plain = Path::new(pattern);
    if !is_glob_component(pattern) {
        if plain.is_file() {
            return Ok(vec![ContextFile::read(plain)?]);
        }
        if plain.is_dir() {
            let nested = plain.join("**").join("*");
            return load_glob(&nested.to_string_lossy());
        }
        return Ok(Vec::new());
    }

    let matcher = compile(pattern)?;
    let (base, rest) = split_base(plain);
    let max_depth = if pattern.contains("**") {
        None
    } else {
        Some(rest)
    };

    let mut paths = Vec::new();
    walk(&base, &matcher, max_depth, &mut paths);
    paths.sort();
    debug!(pattern, matched = paths.len(), "Loaded context glob");

    paths.iter().map(|path| ContextFile::read(path)).collect()
}

fn compile(pattern: &str) -> Result<GlobMatcher, ContextError> {
    let to_error = |source| ContextError::Pattern {
        pattern: pattern.to_string(),
        source,
    };
    let glob: Glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(to_error)?;
    Ok(glob.compile_matcher())
}

/// Leading components without glob syntax, plus how many components follow.
fn split_base(pattern: &Path) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut components = pattern.components();
    let mut rest = 0;
    for component in components.by_ref() {
        let is_glob = matches!(component, Component::Normal(part) if is_glob_component(&part.to_string_lossy()));
        if is_glob {
            rest = 1;
            break;
        }
        base.push(component);
    }
    (base, rest + components.count())
}

fn walk(dir: &Path, matcher: &GlobMatcher, depth: Option<usize>, out: &mut Vec<PathBuf>) {
    if depth == Some(0) {
        return;
    }
    let read_from = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let Ok(entries) = std::fs::read_dir(read_from) else {
        debug!(dir = %read_from.display(), "Skipping unreadable context directory");
        return;
    };

    for entry in entries.flatten() {
        let path = dir.join(entry.file_name());
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            walk(&path, matcher, depth.map(|d| d - 1), out);
        } else if matcher.is_match(&path) {
            out.push(path);
        }
    }
}
