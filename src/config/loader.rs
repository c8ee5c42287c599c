//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PipelineConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/pipeline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = parse_config("logging_enabled = maybe").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors_joined() {
        let err = parse_config(
            r#"
            [[categories]]
            name = "Simple"
            sinks = ["a", "b"]
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: category `Simple` references unknown sink `a`, \
             category `Simple` references unknown sink `b`"
        );
    }

    #[test]
    fn test_unknown_timestamp_specifier_rejected() {
        let err = parse_config(
            r#"
            [[sinks]]
            name = "rolling"
            kind = "rolling_flat_file"
            path = "/tmp/RollingFlatFile.log"
            timestamp_pattern = "%Q"
            template = "{timestamp(%!)} {message}"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: sink `rolling` has an unusable timestamp pattern `%Q`, \
             sink `rolling` template has an invalid timestamp format `%!`"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
            [[sinks]]
            name = "flat"
            kind = "flat_file"
            path = "/tmp/FlatFile.log"

            [[categories]]
            name = "Simple"
            sinks = ["flat"]
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.sinks.len(), 1);
        assert_eq!(config.categories[0].name, "Simple");
    }
}
