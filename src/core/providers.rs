use crate::core::builtin_providers::{
    find_builtin_provider, find_provider_for_model, BuiltinProvider,
};
use crate::core::config::Config;
use std::error::Error;
use std::fmt;

const QUICK_FIXES: &[&str] = &[
    "juggler set api-key <provider> <key>   # Store a key in the config file",
    "export OPENAI_API_KEY=sk-...           # Or use the provider's environment variable",
    "juggler -m openai/gpt-4o ...           # Pick the provider explicitly",
];

#[derive(Clone, Debug)]
pub struct ProviderSession {
    pub api_key: String,
    pub base_url: String,
    pub provider_id: String,
    pub provider_display_name: String,
    pub mode: Option<String>,
    pub max_tokens: Option<u32>,
}

impl ProviderSession {
    pub fn is_anthropic_mode(&self) -> bool {
        self.mode.as_deref() == Some("anthropic")
    }

    /// Model name as the provider expects it, without a `provider/` prefix.
    pub fn api_model_name<'a>(&self, model: &'a str) -> &'a str {
        match model.split_once('/') {
            Some((provider, name)) if provider.eq_ignore_ascii_case(&self.provider_id) => name,
            _ => model,
        }
    }
}

#[derive(Debug)]
pub struct ProviderResolutionError {
    message: String,
    quick_fixes: &'static [&'static str],
    exit_code: i32,
}

impl ProviderResolutionError {
    pub fn missing_api_key(provider: &BuiltinProvider) -> Self {
        Self::new(
            format!(
                "❌ No API key configured for {} and {} is not set",
                provider.display_name, provider.api_key_env
            ),
            QUICK_FIXES,
            2,
        )
    }

    pub fn missing_custom_api_key(provider: &str) -> Self {
        Self::new(
            format!("❌ No API key configured for provider '{provider}'"),
            QUICK_FIXES,
            2,
        )
    }

    pub fn unknown_provider(provider: &str) -> Self {
        Self::new(
            format!(
                "❌ Unknown provider '{provider}'. Configure a base_url for it under [providers.{provider}]."
            ),
            QUICK_FIXES,
            2,
        )
    }

    pub fn unroutable_model(model: &str) -> Self {
        Self::new(
            format!(
                "❌ No provider serves model '{model}'. Use the provider/model form or set default-provider."
            ),
            QUICK_FIXES,
            2,
        )
    }

    fn new(
        message: impl Into<String>,
        quick_fixes: &'static [&'static str],
        exit_code: i32,
    ) -> Self {
        Self {
            message: message.into(),
            quick_fixes,
            exit_code,
        }
    }

    pub fn quick_fixes(&self) -> &'static [&'static str] {
        self.quick_fixes
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for ProviderResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ProviderResolutionError {}

/// Where API keys come from besides the config file.
pub trait KeySource {
    fn env_key(&self, var: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl KeySource for ProcessEnv {
    fn env_key(&self, var: &str) -> Option<String> {
        std::env::var(var).ok().filter(|value| !value.trim().is_empty())
    }
}

pub fn resolve_session(
    config: &Config,
    model: &str,
) -> Result<ProviderSession, ProviderResolutionError> {
    resolve_session_with(config, model, &ProcessEnv)
}

/// Pick the provider for `model`: an explicit `provider/` prefix wins, then
/// the built-in model prefixes, then the configured default provider.
pub fn resolve_session_with<K: KeySource>(
    config: &Config,
    model: &str,
    keys: &K,
) -> Result<ProviderSession, ProviderResolutionError> {
    let explicit = model
        .split_once('/')
        .map(|(provider, _)| provider)
        .filter(|provider| {
            find_builtin_provider(provider).is_some() || config.provider(provider).is_some()
        });

    let provider_id = match explicit {
        Some(provider) => provider.to_lowercase(),
        None => match find_provider_for_model(model) {
            Some(builtin) => builtin.id,
            None => config
                .default_provider
                .clone()
                .ok_or_else(|| ProviderResolutionError::unroutable_model(model))?,
        },
    };

    build_session(config, &provider_id, keys)
}

fn build_session<K: KeySource>(
    config: &Config,
    provider_id: &str,
    keys: &K,
) -> Result<ProviderSession, ProviderResolutionError> {
    let overrides = config.provider(provider_id).cloned().unwrap_or_default();

    match find_builtin_provider(provider_id) {
        Some(builtin) => {
            let api_key = overrides
                .api_key
                .or_else(|| keys.env_key(&builtin.api_key_env))
                .ok_or_else(|| ProviderResolutionError::missing_api_key(&builtin))?;
            Ok(ProviderSession {
                api_key,
                base_url: overrides.base_url.unwrap_or(builtin.base_url),
                provider_id: builtin.id,
                provider_display_name: builtin.display_name,
                mode: builtin.mode,
                max_tokens: overrides.max_tokens.or(builtin.max_tokens),
            })
        }
        None => {
            let base_url = overrides
                .base_url
                .ok_or_else(|| ProviderResolutionError::unknown_provider(provider_id))?;
            let api_key = overrides
                .api_key
                .ok_or_else(|| ProviderResolutionError::missing_custom_api_key(provider_id))?;
            Ok(ProviderSession {
                api_key,
                base_url,
                provider_id: provider_id.to_string(),
                provider_display_name: provider_id.to_string(),
                mode: None,
                max_tokens: overrides.max_tokens,
            })
        }
    }
}
