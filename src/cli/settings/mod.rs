//! Settings management for CLI set/unset commands.
//!
//! Each configuration key has a [`SettingHandler`]; the [`SettingRegistry`]
//! maps keys to handlers. Handlers only mutate the in-memory [`Config`];
//! loading and saving happen once around them in [`apply_set`] and
//! [`apply_unset`].

pub mod error;
pub mod handlers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use crate::core::config::data::Config;

/// Trait for handling a configuration setting.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Set the configuration value from the arguments after the key.
    ///
    /// Returns a success message to display.
    fn set(&self, args: &[String], config: &mut Config) -> Result<String, SettingError>;

    /// Unset (clear) the configuration value.
    fn unset(&self, args: Option<&str>, config: &mut Config) -> Result<String, SettingError>;
}

/// Applies `juggler set <key> <args..>` to `config` without saving.
pub fn set_in(
    registry: &SettingRegistry,
    config: &mut Config,
    key: &str,
    args: &[String],
) -> Result<String, SettingError> {
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    handler.set(args, config)
}

/// Applies `juggler unset <key> [arg]` to `config` without saving.
pub fn unset_in(
    registry: &SettingRegistry,
    config: &mut Config,
    key: &str,
    arg: Option<&str>,
) -> Result<String, SettingError> {
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    handler.unset(arg, config)
}

fn load() -> Result<Config, SettingError> {
    Config::load().map_err(|e| SettingError::ConfigError(e.to_string()))
}

fn save(config: &Config) -> Result<(), SettingError> {
    config
        .save()
        .map_err(|e| SettingError::ConfigError(e.to_string()))
}

/// `juggler set`: with no value, prints the current configuration.
pub fn apply_set(key: Option<&str>, args: &[String]) -> Result<(), SettingError> {
    let mut config = load()?;
    let Some(key) = key.filter(|_| !args.is_empty()) else {
        config.print_all();
        println!();
        println!(
            "Keys: {}",
            SettingRegistry::new().keys_display_order().join(", ")
        );
        return Ok(());
    };

    let message = set_in(&SettingRegistry::new(), &mut config, key, args)?;
    save(&config)?;
    println!("{message}");
    Ok(())
}

/// `juggler unset`.
pub fn apply_unset(key: &str, arg: Option<&str>) -> Result<(), SettingError> {
    let mut config = load()?;
    let message = unset_in(&SettingRegistry::new(), &mut config, key, arg)?;
    save(&config)?;
    println!("{message}");
    Ok(())
}
