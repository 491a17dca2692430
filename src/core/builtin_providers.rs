//! Built-in provider configuration
//!
//! Providers are described in `builtin_models.toml`, embedded at build time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinProvider {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub mode: Option<String>,
    pub api_key_env: String,
    #[serde(default)]
    pub model_prefixes: Vec<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

impl BuiltinProvider {
    /// Get the authentication mode for this provider
    pub fn auth_mode(&self) -> &str {
        self.mode.as_deref().unwrap_or("openai")
    }

    pub fn is_anthropic_mode(&self) -> bool {
        self.auth_mode() == "anthropic"
    }

    pub fn serves_model(&self, model: &str) -> bool {
        self.model_prefixes
            .iter()
            .any(|prefix| model.starts_with(prefix.as_str()))
    }
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<BuiltinProvider> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.providers
}

/// Find a built-in provider by ID (case-insensitive)
pub fn find_builtin_provider(id: &str) -> Option<BuiltinProvider> {
    load_builtin_providers()
        .into_iter()
        .find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Find the built-in provider whose model prefixes match `model`
pub fn find_provider_for_model(model: &str) -> Option<BuiltinProvider> {
    load_builtin_providers()
        .into_iter()
        .find(|p| p.serves_model(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builtin_providers() {
        let providers = load_builtin_providers();
        let provider_ids: Vec<&str> = providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(provider_ids, vec!["openai", "anthropic", "deepseek", "gemini"]);
    }

    #[test]
    fn test_find_builtin_provider() {
        let provider = find_builtin_provider("OpenAI");
        assert_eq!(provider.unwrap().id, "openai");

        let provider = find_builtin_provider("anthropic");
        assert_eq!(provider.unwrap().display_name, "Anthropic");

        assert!(find_builtin_provider("nonexistent").is_none());
    }

    #[test]
    fn test_models_route_by_prefix() {
        assert_eq!(find_provider_for_model("gpt-4o").unwrap().id, "openai");
        assert_eq!(find_provider_for_model("o1-mini").unwrap().id, "openai");
        assert_eq!(
            find_provider_for_model("claude-3-5-sonnet-20240620").unwrap().id,
            "anthropic"
        );
        assert_eq!(find_provider_for_model("deepseek-chat").unwrap().id, "deepseek");
        assert!(find_provider_for_model("llama3").is_none());
    }

    #[test]
    fn test_anthropic_mode() {
        let anthropic = find_builtin_provider("anthropic").unwrap();
        assert!(anthropic.is_anthropic_mode());
        assert_eq!(anthropic.max_tokens, Some(4096));

        let openai = find_builtin_provider("openai").unwrap();
        assert!(!openai.is_anthropic_mode());
        assert_eq!(openai.auth_mode(), "openai");
    }

    #[test]
    fn test_provider_properties() {
        for provider in load_builtin_providers() {
            assert!(!provider.display_name.is_empty());
            assert!(provider.base_url.starts_with("https://"));
            assert!(provider.api_key_env.ends_with("_API_KEY"));
            assert!(!provider.model_prefixes.is_empty());
        }
    }
}
