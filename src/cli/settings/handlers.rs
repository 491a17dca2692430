//! Handlers for each `juggler set` / `juggler unset` key.

use std::path::PathBuf;

use crate::core::builtin_providers::find_builtin_provider;
use crate::core::config::data::{path_display, Config};

use super::error::SettingError;
use super::SettingHandler;

/// Canonical id of a built-in or configured provider.
fn validate_provider(config: &Config, input: &str) -> Result<String, SettingError> {
    if let Some(provider) = find_builtin_provider(input) {
        return Ok(provider.id);
    }
    if config.provider(input).is_some() {
        return Ok(input.to_lowercase());
    }
    Err(SettingError::UnknownProvider {
        input: input.to_string(),
    })
}

fn provider_arg<'a>(
    args: Option<&'a str>,
    hint: &'static str,
    example: &'static str,
) -> Result<&'a str, SettingError> {
    args.filter(|arg| !arg.trim().is_empty())
        .ok_or(SettingError::MissingArgs { hint, example })
}

pub struct DefaultModelHandler;

impl SettingHandler for DefaultModelHandler {
    fn key(&self) -> &'static str {
        "default-model"
    }

    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError> {
        let model = args.join(" ");
        config.default_model = Some(model.clone());
        Ok(format!("✅ Set default-model to: {model}"))
    }

    fn unset(&self, _args: Option<&str>, config: &mut Config) -> Result<String, SettingError> {
        config.default_model = None;
        Ok("✅ Unset default-model".to_string())
    }
}

pub struct DefaultProviderHandler;

impl SettingHandler for DefaultProviderHandler {
    fn key(&self) -> &'static str {
        "default-provider"
    }

    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError> {
        let provider = validate_provider(config, &args.join(" "))?;
        config.default_provider = Some(provider.clone());
        Ok(format!("✅ Set default-provider to: {provider}"))
    }

    fn unset(&self, _args: Option<&str>, config: &mut Config) -> Result<String, SettingError> {
        config.default_provider = None;
        Ok("✅ Unset default-provider".to_string())
    }
}

pub struct ApiKeyHandler;

impl SettingHandler for ApiKeyHandler {
    fn key(&self) -> &'static str {
        "api-key"
    }

    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError> {
        let [provider, key] = args else {
            return Err(SettingError::MissingArgs {
                hint: "To store an API key, specify the provider and the key:",
                example: "juggler set api-key openai sk-...",
            });
        };
        let provider = validate_provider(config, provider)?;
        config.set_api_key(&provider, key.clone());
        Ok(format!("✅ Stored API key for provider: {provider}"))
    }

    fn unset(&self, args: Option<&str>, config: &mut Config) -> Result<String, SettingError> {
        let provider = provider_arg(
            args,
            "To remove an API key, specify the provider:",
            "juggler unset api-key openai",
        )?;
        config.unset_api_key(provider);
        Ok(format!("✅ Removed API key for provider: {provider}"))
    }
}

pub struct BaseUrlHandler;

impl SettingHandler for BaseUrlHandler {
    fn key(&self) -> &'static str {
        "base-url"
    }

    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError> {
        let [provider, url] = args else {
            return Err(SettingError::MissingArgs {
                hint: "To set a base URL, specify the provider and the URL:",
                example: "juggler set base-url local http://localhost:11434/v1",
            });
        };
        config.set_base_url(provider, url.clone());
        Ok(format!(
            "✅ Set base-url for provider '{}' to: {url}",
            provider.to_lowercase()
        ))
    }

    fn unset(&self, args: Option<&str>, config: &mut Config) -> Result<String, SettingError> {
        let provider = provider_arg(
            args,
            "To remove a base URL, specify the provider:",
            "juggler unset base-url local",
        )?;
        config.unset_base_url(provider);
        Ok(format!("✅ Removed base-url for provider: {provider}"))
    }
}

pub struct TemplateDirHandler;

impl SettingHandler for TemplateDirHandler {
    fn key(&self) -> &'static str {
        "template-dir"
    }

    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError> {
        let dir = PathBuf::from(args.join(" "));
        let shown = path_display(&dir);
        if !config.template_dirs.contains(&dir) {
            config.template_dirs.push(dir);
        }
        Ok(format!("✅ Added template directory: {shown}"))
    }

    fn unset(&self, args: Option<&str>, config: &mut Config) -> Result<String, SettingError> {
        match args {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                config.template_dirs.retain(|existing| existing != &dir);
                Ok(format!("✅ Removed template directory: {}", path_display(&dir)))
            }
            None => {
                config.template_dirs.clear();
                Ok("✅ Cleared template directories".to_string())
            }
        }
    }
}
