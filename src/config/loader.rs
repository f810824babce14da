//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load the file if it exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = ?path, "No config file found, using defaults");
        Ok(ServiceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let config = parse_config(
            r#"
            [[breakers]]
            name = "payments"
            timeoutInMs = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.breakers[0].options.timeout_ms(), 500);
    }

    #[test]
    fn test_parse_reports_validation_errors() {
        let err = parse_config(
            r#"
            [[breakers]]
            name = "a"
            [[breakers]]
            name = "a"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("'a' is defined more than once"));
    }

    #[test]
    fn test_parse_error_on_bad_toml() {
        assert!(matches!(parse_config("[[breakers]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_or_default(Path::new("definitely-missing-tripwire.toml")).unwrap();
        assert!(config.breakers.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("tripwire_loader_test.toml");
        fs::write(&path, "[[breakers]]\nname = \"disk\"\nmaxFailures = 7\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.breakers[0].options.max_failures(), 7);

        fs::remove_file(&path).unwrap_or_default();
    }
}
