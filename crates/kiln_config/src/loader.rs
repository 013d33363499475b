//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KilnConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
///
/// Relative cache directories are resolved against `project_dir`.
pub fn load_config(project_dir: &Path) -> Result<KilnConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let mut config = load_config_from_str(&content)?;
    if config.cache.directory.is_relative() {
        config.cache.directory = project_dir.join(&config.cache.directory);
    }
    Ok(config)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values can be used as file names.
fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    let cache = &config.cache;
    if cache.directory.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("cache.directory"));
    }
    if cache.extension.is_empty() {
        return Err(ConfigError::MissingField("cache.extension"));
    }
    if cache
        .extension
        .chars()
        .any(|c| c == '.' || std::path::is_separator(c))
    {
        return Err(ConfigError::InvalidValue {
            field: "cache.extension",
            reason: format!(
                "'{}' must not contain dots or path separators",
                cache.extension
            ),
        });
    }
    if cache.namespace.as_deref() == Some("") {
        return Err(ConfigError::InvalidValue {
            field: "cache.namespace",
            reason: "must not be empty when set".to_string(),
        });
    }
    Ok(())
}
