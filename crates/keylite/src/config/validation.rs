//! Configuration validation rules.
//!
//! This module provides validation logic for [`StoreConfig`] values after
//! they have been loaded from environment, files, or defaults.

use thiserror::Error;

use crate::config::StoreConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl StoreConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `uri` is absent or empty
    /// - `table` is not a bare SQL identifier
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_uri()?;

        if !is_identifier(&self.table) {
            return Err(ConfigError::Invalid {
                field: "table".into(),
                reason: "must contain only letters, digits, and underscores, and not start with a digit".into(),
            });
        }

        if self.enable_wal_mode && self.is_in_memory() {
            tracing::warn!("enable_wal_mode has no effect on an in-memory database");
        }

        Ok(())
    }

    /// The database location, which every store needs before it can open.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `uri` is absent or empty.
    pub fn require_uri(&self) -> Result<&str, ConfigError> {
        match self.uri.as_deref() {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => Err(ConfigError::Missing {
                field: "uri".into(),
                hint: "set KEYLITE_URI or StoreConfig::uri".into(),
            }),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_in_memory_config() {
        assert!(StoreConfig::in_memory().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_uri() {
        let config = StoreConfig::default();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "uri"));
    }

    #[test]
    fn test_validate_empty_uri() {
        let config = StoreConfig::new("");
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "uri"));
    }

    #[test]
    fn test_validate_table_with_quote() {
        let config = StoreConfig { table: "caches\"; DROP TABLE x".into(), ..StoreConfig::in_memory() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "table"));
    }

    #[test]
    fn test_validate_table_leading_digit() {
        let config = StoreConfig { table: "1caches".into(), ..StoreConfig::in_memory() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "table"));
    }

    #[test]
    fn test_validate_custom_table() {
        let config = StoreConfig { table: "session_cache".into(), ..StoreConfig::in_memory() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("caches"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("with space"));
        assert!(!is_identifier("semi;colon"));
    }
}
