//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::address::parse_origin;
use crate::config::AppConfig;
use thiserror::Error;

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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when the generation or asset list is empty,
    /// and `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - an exclusion pattern is empty (it would match every URL)
    /// - `manifest_path` or `user_agent` is empty
    /// - `max_bytes` is 0 or exceeds 512MB
    /// - `timeout_ms` is set below 100ms
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "generation".into(), reason: "must not be empty".into() });
        }

        parse_origin(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;

        if self.assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "assets".into(),
                hint: "list at least the entry document, e.g. assets = [\"index.html\"]".into(),
            });
        }

        if self.exclusions.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "exclusions".into(),
                reason: "patterns must not be empty".into(),
            });
        }

        if self.manifest_path.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "manifest_path".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 512 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 512MB".into() });
        }

        if let Some(timeout_ms) = self.timeout_ms
            && timeout_ms < 100
        {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }

        if !self.assets.iter().any(|a| a.trim_end_matches('/').ends_with(self.manifest_path.as_str())) {
            tracing::warn!(
                manifest_path = %self.manifest_path,
                "application manifest is not in the asset list; it will only be cached on first fetch"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_generation() {
        let config = AppConfig { generation: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "generation"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_non_http_origin() {
        let config = AppConfig { origin: "file:///srv/app/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_empty_assets() {
        let config = AppConfig { assets: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "assets"));
    }

    #[test]
    fn test_validate_empty_exclusion_pattern() {
        let config = AppConfig { exclusions: vec!["cdn.example.com".into(), String::new()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "exclusions"));
    }

    #[test]
    fn test_validate_no_exclusions_is_fine() {
        let config = AppConfig { exclusions: Vec::new(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_manifest_path() {
        let config = AppConfig { manifest_path: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "manifest_path"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_max_bytes_bounds() {
        let zero = AppConfig { max_bytes: 0, ..Default::default() };
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));

        let huge = AppConfig { max_bytes: 513 * 1024 * 1024, ..Default::default() };
        assert!(matches!(huge.validate(), Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));

        let edge = AppConfig { max_bytes: 512 * 1024 * 1024, ..Default::default() };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: Some(50), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }
}
