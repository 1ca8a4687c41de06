//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DocCacheResult};

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_LIST_PREFIX: &str = "doccache:list:";
const DEFAULT_INFO_PREFIX: &str = "doccache:info:";

/// Cache policy shared by every model of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, reads go straight to the store and nothing is cached.
    pub enabled: bool,
    /// Namespace-wide expiry, refreshed on every miss population.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Prefix of the namespace holding multi-document results.
    pub list_prefix: String,
    /// Prefix of the namespace holding single rows and counts.
    pub info_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            list_prefix: DEFAULT_LIST_PREFIX.to_string(),
            info_prefix: DEFAULT_INFO_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `DOCCACHE_ENABLED`: "true" or "false" (default: true)
    /// - `DOCCACHE_TTL_SECS`: Namespace TTL in seconds (default: 3600)
    /// - `DOCCACHE_LIST_PREFIX`: List namespace prefix (default: "doccache:list:")
    /// - `DOCCACHE_INFO_PREFIX`: Info namespace prefix (default: "doccache:info:")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            enabled: std::env::var("DOCCACHE_ENABLED")
                .ok()
                .map(|s| s.trim().to_lowercase() != "false")
                .unwrap_or(defaults.enabled),
            ttl: std::env::var("DOCCACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            list_prefix: std::env::var("DOCCACHE_LIST_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.list_prefix),
            info_prefix: std::env::var("DOCCACHE_INFO_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.info_prefix),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_prefixes(mut self, list: impl Into<String>, info: impl Into<String>) -> Self {
        self.list_prefix = list.into();
        self.info_prefix = info.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - ttl is positive
    /// - both prefixes are non-empty
    /// - the prefixes differ, so list and info namespaces never alias
    pub fn validate(&self) -> DocCacheResult<()> {
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "ttl must be positive".to_string(),
            }
            .into());
        }

        for (field, value) in [
            ("list_prefix", &self.list_prefix),
            ("info_prefix", &self.info_prefix),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: String::new(),
                    reason: "prefix must not be empty".to_string(),
                }
                .into());
            }
        }

        if self.list_prefix == self.info_prefix {
            return Err(ConfigError::IncompatibleOptions {
                option_a: format!("list_prefix={}", self.list_prefix),
                option_b: format!("info_prefix={}", self.info_prefix),
            }
            .into());
        }

        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// =============================================================================
// TESTS
// =============================================================================
