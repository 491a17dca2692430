use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-provider overrides. Anything left unset falls back to the built-in
/// provider table and the provider's API key environment variable.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Model used when `--model` is not given (e.g., "gpt-4o")
    pub default_model: Option<String>,
    /// Provider used for models that no built-in provider claims
    pub default_provider: Option<String>,
    /// Keyed by provider id (e.g., "openai", "anthropic")
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Extra template directories, searched after the user prompts directory
    #[serde(default)]
    pub template_dirs: Vec<PathBuf>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.get(&id.to_lowercase())
    }

    pub fn provider_mut(&mut self, id: &str) -> &mut ProviderConfig {
        self.providers.entry(id.to_lowercase()).or_default()
    }
}
