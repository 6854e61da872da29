//! Application settings loading from config.toml
//!
//! Every key has a default so the file is optional. Environment variables win
//! over the file: `DATABASE_URL` replaces `database.url` and
//! `RECEIPT_LEDGER_CONFIG` points at a different TOML file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Default `SQLite` database, created on first use
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/receipts.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage settings
    pub database: DatabaseConfig,
    /// Log output settings
    pub logging: LoggingConfig,
    /// File the settings were read from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// `[database]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML syntax is invalid or a value has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or does not parse.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    let mut config = parse_config(&contents)?;
    config.source = Some(path_ref.to_path_buf());
    Ok(config)
}

/// Loads the application configuration the binary runs with.
///
/// Reads `RECEIPT_LEDGER_CONFIG` (or `./config.toml`) when the file exists,
/// falls back to defaults otherwise, then applies `DATABASE_URL`. This runs
/// before logging is set up; [`AppConfig::source`] tells which case applied.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("RECEIPT_LEDGER_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        AppConfig::default()
    };

    match std::env::var("DATABASE_URL") {
        Ok(url) => config.database.url = url,
        Err(std::env::VarError::NotPresent) => {}
        Err(e) => return Err(e.into()),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [logging]
            filter = "receipt_ledger=debug"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.logging.filter, "receipt_ledger=debug");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.logging.filter, "info");

        let config = parse_config("[logging]\nfilter = \"warn\"").unwrap();
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[database\nurl = 3");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_config_records_source() {
        let path = std::env::temp_dir().join(format!("receipt-ledger-{}.toml", std::process::id()));
        std::fs::write(&path, "[logging]\nfilter = \"debug\"\n").unwrap();

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(parse_config("").unwrap().source, None);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
