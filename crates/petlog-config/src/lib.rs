//! Configuration parsing and validation for the PetLog client
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Backend connection settings (base URL, timeout, cache TTL)
//! - Home card settings (swipe threshold, watch interval)
//! - Validation that reports every problem at once

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Why a configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("{} invalid setting(s): {}", errors.len(), join_errors(errors))]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("config_version {0} is not supported (expected {CURRENT_CONFIG_VERSION})")]
    UnsupportedVersion(u32),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the defaults
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse a TOML document, check its version, then validate every section.
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;
    match raw.config_version {
        CURRENT_CONFIG_VERSION => {}
        other => return Err(ConfigError::UnsupportedVersion(other)),
    }

    match validate_config(&raw).as_slice() {
        [] => Ok(Settings::from_raw(raw)),
        errors => Err(ConfigError::ValidationFailed {
            errors: errors.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [client]
            base_url = "https://api.petlog.app/"
            timeout_seconds = 10
            cache_ttl_seconds = 120

            [cards]
            swipe_threshold = 80.0
            refresh_interval_seconds = 15
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.client.base_url, "https://api.petlog.app");
        assert_eq!(settings.client.timeout, Duration::from_secs(10));
        assert_eq!(settings.client.cache_ttl, Duration::from_secs(120));
        assert_eq!(settings.cards.swipe_threshold, 80.0);
        assert_eq!(settings.cards.refresh_interval, Duration::from_secs(15));
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_unknown_keys() {
        let config = r#"
            config_version = 1
            [client]
            base_uri = "http://localhost"
        "#;
        assert!(matches!(parse_config(config), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn reject_unknown_sections() {
        let config = r#"
            config_version = 1
            [client_]
            base_url = "http://localhost"
        "#;
        assert!(matches!(parse_config(config), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn validation_errors_are_collected() {
        let config = r#"
            config_version = 1
            [client]
            timeout_seconds = 0
            [cards]
            refresh_interval_seconds = 0
        "#;
        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_version = 1\n[client]\nbase_url = \"http://10.0.0.2:9000\"\n",
        )
        .unwrap();

        let settings = load_config(&path).unwrap();
        assert_eq!(settings.client.base_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(matches!(load_config(&path), Err(ConfigError::ReadError(_))));
        assert_eq!(load_config_or_default(&path).unwrap(), Settings::default());
    }
}
