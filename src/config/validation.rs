use crate::config::types::{Config, LibraryConfig, ManagerConfig, ParserConfig, StorageConfig};
use crate::parsers::ParserKind;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_manager_config(&config.manager)?;
    validate_parser_config(&config.parser)?;
    validate_library_config(&config.library)?;
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.storage_path.is_empty() {
        return Err(ConfigError::Validation(
            "storage_path cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates manager configuration
fn validate_manager_config(config: &ManagerConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > 32 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 32, got {}",
            config.worker_count
        )));
    }

    for name in &config.sources {
        validate_source_name(name)?;
    }

    Ok(())
}

/// Checks that a source short name maps to a source with a parser
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    match ParserKind::from_short_name(name) {
        Some(kind) if kind.is_supported() => Ok(()),
        Some(kind) => Err(ConfigError::Validation(format!(
            "source '{}' ({}) has no parser",
            name,
            kind.source_name()
        ))),
        None => Err(ConfigError::UnknownSource(name.to_string())),
    }
}

/// Validates parser timing configuration
fn validate_parser_config(config: &ParserConfig) -> Result<(), ConfigError> {
    if config.tick_ms < 1 {
        return Err(ConfigError::Validation(
            "tick_ms must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates library configuration
fn validate_library_config(config: &LibraryConfig) -> Result<(), ConfigError> {
    if let Some(url_list) = &config.url_list {
        if url_list.is_empty() {
            return Err(ConfigError::Validation(
                "url_list cannot be empty when set".to_string(),
            ));
        }
    }

    if config.refresh_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "refresh_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
