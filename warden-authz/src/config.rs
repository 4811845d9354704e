//! Authorization configuration.
//!
//! Controls the per-user role cache. Configuration can be loaded from
//! environment variables with defaults suitable for most deployments.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Authorization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Whether users' role lists are cached between checks.
    pub cache_user_roles: bool,

    /// Lifetime of each user role cache entry.
    pub user_cache_ttl: Duration,

    /// Prefix of user role cache keys, followed by the user's primary key.
    pub user_cache_prefix: String,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            cache_user_roles: true,
            user_cache_ttl: Duration::from_secs(60),
            user_cache_prefix: "user_".to_string(),
        }
    }
}

impl AuthzConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WARDEN_CACHE_USER_ROLES`: Cache user role lists (default: true)
    /// - `WARDEN_USER_CACHE_TTL_SECS`: User cache entry TTL in seconds (default: 60)
    /// - `WARDEN_USER_CACHE_PREFIX`: User cache key prefix (default: `user_`)
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] when a variable is set but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let cache_user_roles = match lookup("WARDEN_CACHE_USER_ROLES") {
            Some(raw) => parse_bool("WARDEN_CACHE_USER_ROLES", &raw)?,
            None => default.cache_user_roles,
        };

        let user_cache_ttl = match lookup("WARDEN_USER_CACHE_TTL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "WARDEN_USER_CACHE_TTL_SECS".to_string(),
                    message: e.to_string(),
                })?,
            None => default.user_cache_ttl,
        };

        let config = Self {
            cache_user_roles,
            user_cache_ttl,
            user_cache_prefix: lookup("WARDEN_USER_CACHE_PREFIX").unwrap_or(default.user_cache_prefix),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// A zero TTL with caching enabled would make every entry expire on
    /// arrival.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_user_roles && self.user_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "user_cache_ttl".to_string(),
                message: "must be positive when user role caching is enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Enable or disable the user role cache.
    pub fn with_user_cache(mut self, enabled: bool) -> Self {
        self.cache_user_roles = enabled;
        self
    }

    /// Set the user role cache TTL.
    pub fn with_user_cache_ttl(mut self, ttl: Duration) -> Self {
        self.user_cache_ttl = ttl;
        self
    }

    /// Set the user role cache key prefix.
    pub fn with_user_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_cache_prefix = prefix.into();
        self
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuthzConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AuthzConfig::default());
        assert!(config.cache_user_roles);
        assert_eq!(config.user_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.user_cache_prefix, "user_");
    }

    #[test]
    fn test_overrides() {
        let config = AuthzConfig::from_lookup(lookup(&[
            ("WARDEN_CACHE_USER_ROLES", "off"),
            ("WARDEN_USER_CACHE_TTL_SECS", "300"),
            ("WARDEN_USER_CACHE_PREFIX", "account_"),
        ]))
        .unwrap();
        assert!(!config.cache_user_roles);
        assert_eq!(config.user_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.user_cache_prefix, "account_");
    }

    #[test]
    fn test_invalid_values() {
        let err = AuthzConfig::from_lookup(lookup(&[("WARDEN_USER_CACHE_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WARDEN_USER_CACHE_TTL_SECS"));

        assert!(AuthzConfig::from_lookup(lookup(&[("WARDEN_CACHE_USER_ROLES", "maybe")])).is_err());
        assert!(AuthzConfig::from_lookup(lookup(&[("WARDEN_USER_CACHE_TTL_SECS", "0")])).is_err());
        assert!(AuthzConfig::from_lookup(lookup(&[
            ("WARDEN_USER_CACHE_TTL_SECS", "0"),
            ("WARDEN_CACHE_USER_ROLES", "false"),
        ]))
        .is_ok());
    }

    #[test]
    fn test_max_ttl_accepted() {
        let config = AuthzConfig::from_lookup(lookup(&[("WARDEN_USER_CACHE_TTL_SECS", "18446744073709551615")])).unwrap();
        assert_eq!(config.user_cache_ttl, Duration::from_secs(u64::MAX));
    }
}
