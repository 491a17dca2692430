//! Template discovery across the configured search path.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::config::io::config_dir;
use crate::core::config::Config;

use super::engine::Template;

pub const TEMPLATE_EXTENSION: &str = "j2";
const TEMPLATE_SUFFIX: &str = ".j2";
pub const PROMPTS_DIR_ENV: &str = "JUGGLER_PROMPTS_DIR";

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{#-?\s*summary:\s*(.*?)\s*-?#\}").expect("summary pattern is valid")
});

/// The `{# summary: ... #}` annotation of a template, if present.
pub fn extract_summary(source: &str) -> Option<String> {
    SUMMARY_RE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|summary| summary.as_str().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummary {
    pub name: String,
    pub path: PathBuf,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct TemplateLoader {
    dirs: Vec<PathBuf>,
}

impl TemplateLoader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Environment override, user prompts, configured extras, then the
    /// templates packaged with the crate.
    pub fn from_config(config: &Config) -> Self {
        let mut dirs = Vec::new();
        if let Some(dir) = std::env::var_os(PROMPTS_DIR_ENV).filter(|v| !v.is_empty()) {
            dirs.push(PathBuf::from(dir));
        }
        dirs.push(config_dir().join("prompts"));
        dirs.extend(config.template_dirs.iter().cloned());
        dirs.push(Self::packaged_dir());
        Self::new(dirs)
    }

    pub fn packaged_dir() -> PathBuf {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts"))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Path of the first `<name>.j2` along the search path.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let file_name = format!("{}{TEMPLATE_SUFFIX}", normalize_name(name));
        self.dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    /// Loads a template and binds it to `model`. `Ok(None)` means no
    /// directory holds a template of that name.
    pub fn get_by_name(&self, model: &str, name: &str) -> io::Result<Option<Template>> {
        let Some(path) = self.find(name) else {
            debug!(name, "Template not found on search path");
            return Ok(None);
        };
        debug!(path = %path.display(), "Loading template");
        let source = fs::read_to_string(&path)?;
        Ok(Some(Template::new(normalize_name(name), source, model)))
    }

    /// Every template on the search path, sorted by name. A name shadowed by
    /// an earlier directory is listed once.
    pub fn list(&self) -> Vec<TemplateSummary> {
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();

        for dir in &self.dirs {
            for path in template_files(dir) {
                let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string())
                else {
                    continue;
                };
                if seen.contains(&name) {
                    continue;
                }
                let source = match fs::read_to_string(&path) {
                    Ok(source) => source,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Skipping unreadable template");
                        continue;
                    }
                };
                seen.insert(name.clone());
                summaries.push(TemplateSummary {
                    summary: extract_summary(&source).unwrap_or_default(),
                    name,
                    path,
                });
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}

fn normalize_name(name: &str) -> &str {
    name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name)
}

fn template_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "Skipping template directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION))
        .collect();
    files.sort();
    files
}
