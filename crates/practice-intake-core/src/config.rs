//! Practice configuration.
//!
//! Loaded from a JSON document, then overridden by environment variables:
//!
//! 1. `PRACTICE_DB_PATH` replaces `databasePath`
//! 2. `PRACTICE_PUBLIC_URL` replaces `publicUrl`
//!
//! A configuration that still carries the `YOUR_...` placeholders from the
//! example file is rejected at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DB_PATH_ENV: &str = "PRACTICE_DB_PATH";
pub const PUBLIC_URL_ENV: &str = "PRACTICE_PUBLIC_URL";

const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error("Configuration value {0} is still a placeholder")]
    Placeholder(&'static str),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Practice configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeConfig {
    /// SQLite database file
    #[serde(default)]
    pub database_path: String,
    /// Public address of the app, used to build intake links
    #[serde(default)]
    pub public_url: String,
    /// Query key carrying the intake token
    #[serde(default = "default_intake_param")]
    pub intake_param: String,
    /// Trailing-edge delay for directory search
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

fn default_intake_param() -> String {
    "client".to_string()
}

fn default_search_debounce_ms() -> u64 {
    300
}

impl PracticeConfig {
    /// Configuration with defaults for everything but the two required values.
    pub fn new(database_path: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            public_url: public_url.into(),
            intake_param: default_intake_param(),
            search_debounce_ms: default_search_debounce_ms(),
        }
    }

    /// Parse a JSON document, apply environment overrides and validate.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Replace values with their environment overrides, when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = path;
        }
        if let Some(url) = lookup(PUBLIC_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.public_url = url;
        }
    }

    /// Reject missing and placeholder values.
    pub fn validate(&self) -> ConfigResult<()> {
        check_required("databasePath", &self.database_path)?;
        check_required("publicUrl", &self.public_url)?;
        check_required("intakeParam", &self.intake_param)?;

        if !(self.public_url.starts_with("http://") || self.public_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "publicUrl",
                reason: "expected an http(s) address".to_string(),
            });
        }
        if self
            .intake_param
            .chars()
            .any(|c| matches!(c, '=' | '&' | '?' | '#') || c.is_whitespace())
        {
            return Err(ConfigError::Invalid {
                field: "intakeParam",
                reason: format!("'{}' is not a usable query key", self.intake_param),
            });
        }
        Ok(())
    }

    /// Search delay as a duration.
    pub fn search_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.search_debounce_ms)
    }
}

fn check_required(field: &'static str, value: &str) -> ConfigResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    if value.starts_with(PLACEHOLDER_PREFIX) {
        return Err(ConfigError::Placeholder(field));
    }
    Ok(())
}
