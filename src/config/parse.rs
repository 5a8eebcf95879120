use super::types::*;
use crate::config::{env_var_regex, expand_env_vars, expand_tilde};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load, expand and validate a config file. JSON documents are accepted
/// as well since they parse as YAML.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut text = String::new();
    file.read_to_string(&mut text).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&text)
}

/// Parse config text: `$env{VAR}` expansion, then YAML, then validation.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let text = expand_env_vars(text);
    check_unexpanded_vars(&text)?;

    let mut config: Config = serde_yaml::from_str(&text)?;
    config.database.path = expand_tilde(&config.database.path);

    validate_config(&config)?;
    Ok(config)
}

fn check_unexpanded_vars(text: &str) -> Result<(), ConfigError> {
    let mut unexpanded: Vec<String> = env_var_regex()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort();
    unexpanded.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded.join(", ")
    )))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.group_id.trim().is_empty() {
        errors.push("group_id must not be empty".to_string());
    }

    if config.database.path.as_os_str().is_empty() {
        errors.push("database.path must not be empty".to_string());
    }

    if config.database.pool_size == 0 {
        errors.push("database.pool_size must be at least 1".to_string());
    }

    if config.collection.batch_size == 0 {
        errors.push("collection.batch_size must be at least 1".to_string());
    }

    if config.collection.poll_interval.is_zero() {
        errors.push("collection.poll_interval must be greater than zero".to_string());
    }

    if config.collection.max_objects == 0 {
        errors.push("collection.max_objects must be at least 1".to_string());
    }

    if config.discovery.probe_limit <= 0 {
        errors.push("discovery.probe_limit must be at least 1".to_string());
    }

    let mut seen = HashSet::new();
    for (index, source) in config.sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            errors.push(format!("sources[{}]: name must not be empty", index));
        } else if !seen.insert(source.name.as_str()) {
            errors.push(format!("sources[{}]: duplicate source '{}'", index, source.name));
        }

        if source.max_objects == Some(0) {
            errors.push(format!("source '{}': max_objects must be at least 1", source.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
