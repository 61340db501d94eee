//! Store configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (KEYLITE_*)
//! 2. TOML config file (if KEYLITE_CONFIG_FILE set)
//! 3. Built-in defaults

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// URI sentinel for a non-persisted, in-memory database.
pub const MEMORY_URI: &str = ":memory:";

/// Cache store configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (KEYLITE_*)
/// 2. TOML config file (if KEYLITE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file location, or [`MEMORY_URI`] for a non-persisted store.
    ///
    /// Required; construction fails without it. Set via KEYLITE_URI.
    #[serde(default)]
    pub uri: Option<String>,

    /// Name of the cache table. Must be a bare SQL identifier since it is
    /// spliced into every statement.
    ///
    /// Set via KEYLITE_TABLE.
    #[serde(default = "default_table")]
    pub table: String,

    /// Lock-wait budget in milliseconds before a contended statement fails.
    ///
    /// Set via KEYLITE_BUSY_TIMEOUT.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: u64,

    /// Whether to switch the database to write-ahead-log journaling.
    ///
    /// Set via KEYLITE_ENABLE_WAL_MODE.
    #[serde(default)]
    pub enable_wal_mode: bool,

    /// Rows fetched per page during iteration. Accepts a number or a numeric
    /// string; anything unparseable or non-positive falls back to the
    /// default.
    ///
    /// Set via KEYLITE_ITERATION_LIMIT.
    #[serde(default = "default_iteration_limit", deserialize_with = "de_iteration_limit")]
    pub iteration_limit: u32,
}

fn default_table() -> String {
    "caches".into()
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_iteration_limit() -> u32 {
    10
}

fn de_iteration_limit<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(lenient_limit(&raw))
}

fn lenient_limit(raw: &serde_json::Value) -> u32 {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    match parsed {
        Some(limit) if limit > 0 => limit,
        _ => default_iteration_limit(),
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            table: default_table(),
            busy_timeout: default_busy_timeout(),
            enable_wal_mode: false,
            iteration_limit: default_iteration_limit(),
        }
    }
}

impl StoreConfig {
    /// Configuration pointing at a database file.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: Some(uri.into()), ..Self::default() }
    }

    /// Configuration for a non-persisted, in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MEMORY_URI)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `KEYLITE_`
    /// 2. TOML file from `KEYLITE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation fails
    /// after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("KEYLITE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("KEYLITE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Whether this configuration names the in-memory sentinel.
    pub fn is_in_memory(&self) -> bool {
        self.uri.as_deref() == Some(MEMORY_URI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.uri.is_none());
        assert_eq!(config.table, "caches");
        assert_eq!(config.busy_timeout, 5000);
        assert!(!config.enable_wal_mode);
        assert_eq!(config.iteration_limit, 10);
    }

    #[test]
    fn test_in_memory_config() {
        let config = StoreConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.uri.as_deref(), Some(MEMORY_URI));
    }

    #[test]
    fn test_lenient_limit_numeric() {
        assert_eq!(lenient_limit(&serde_json::json!(25)), 25);
    }

    #[test]
    fn test_lenient_limit_numeric_string() {
        assert_eq!(lenient_limit(&serde_json::json!("7")), 7);
    }

    #[test]
    fn test_lenient_limit_invalid_string() {
        assert_eq!(lenient_limit(&serde_json::json!("not-a-number")), 10);
    }

    #[test]
    fn test_lenient_limit_zero_falls_back() {
        assert_eq!(lenient_limit(&serde_json::json!(0)), 10);
    }

    #[test]
    fn test_lenient_limit_negative_falls_back() {
        assert_eq!(lenient_limit(&serde_json::json!(-5)), 10);
    }

    #[test]
    fn test_iteration_limit_from_string_field() {
        let config: StoreConfig =
            serde_json::from_value(serde_json::json!({ "uri": ":memory:", "iteration_limit": "3" }))
                .unwrap();
        assert_eq!(config.iteration_limit, 3);
    }
}
