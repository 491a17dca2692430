//! Error types for settings operations.

use std::fmt;

/// Errors that can occur when modifying configuration settings.
#[derive(Debug)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The provided provider identifier is neither built in nor configured.
    UnknownProvider { input: String },
    /// Required arguments are missing.
    MissingArgs {
        hint: &'static str,
        example: &'static str,
    },
    /// An error occurred while loading or persisting the configuration.
    ConfigError(String),
}

impl SettingError {
    /// Print the error message to stderr with appropriate formatting.
    pub fn print(&self) {
        match self {
            SettingError::UnknownKey(key) => {
                eprintln!("❌ Unknown config key: {key}");
            }
            SettingError::UnknownProvider { input } => {
                eprintln!(
                    "❌ Unknown provider: {input}. Set a base URL first with 'juggler set base-url {input} <url>'."
                );
            }
            SettingError::MissingArgs { hint, example } => {
                eprintln!("⚠️  {hint}");
                eprintln!("Example: {example}");
            }
            SettingError::ConfigError(msg) => {
                eprintln!("❌ Failed to save configuration: {msg}");
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::UnknownProvider { input } => write!(f, "Unknown provider: {input}"),
            SettingError::MissingArgs { hint, .. } => write!(f, "{hint}"),
            SettingError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for SettingError {}
