//! Cache bounds and eviction policy configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default entry-count bound.
pub const DEFAULT_MAX_ENTRIES: usize = 256;
/// Default total payload bound (64 MiB).
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Order in which entries are evicted once a bound is reached.
pub enum EvictionPolicy {
    /// Evict the entry that was read or written least recently.
    #[default]
    Lru,
    /// Evict the entry that was inserted first; reads do not refresh position.
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
/// Bounds for a [`ResourceCache`](crate::ResourceCache).
///
/// `None` disables a bound. Both bounds apply at once when both are set.
pub struct CacheConfig {
    /// Maximum number of cached entries.
    #[serde(alias = "maxEntries")]
    pub max_entries: Option<usize>,
    /// Maximum sum of payload sizes in bytes.
    #[serde(alias = "maxTotalBytes")]
    pub max_total_bytes: Option<usize>,
    /// Eviction order.
    #[serde(alias = "evictionPolicy")]
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_total_bytes: Some(DEFAULT_MAX_TOTAL_BYTES),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

impl CacheConfig {
    /// Configuration with no bounds at all.
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_total_bytes: None,
            eviction_policy: EvictionPolicy::Lru,
        }
    }

    /// Sets the entry-count bound.
    pub fn with_max_entries(mut self, max_entries: impl Into<Option<usize>>) -> Self {
        self.max_entries = max_entries.into();
        self
    }

    /// Sets the total payload bound.
    pub fn with_max_total_bytes(mut self, max_total_bytes: impl Into<Option<usize>>) -> Self {
        self.max_total_bytes = max_total_bytes.into();
        self
    }

    /// Sets the eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Checks that every configured bound can hold at least one entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroBound`] when `max_entries` or `max_total_bytes` is `Some(0)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == Some(0) {
            return Err(ConfigError::ZeroBound {
                option: "max-entries",
            });
        }
        if self.max_total_bytes == Some(0) {
            return Err(ConfigError::ZeroBound {
                option: "max-total-bytes",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_is_bounded_lru() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, Some(DEFAULT_MAX_ENTRIES));
        assert_eq!(config.max_total_bytes, Some(DEFAULT_MAX_TOTAL_BYTES));
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = CacheConfig::default()
            .with_max_entries(2)
            .with_max_total_bytes(None)
            .with_eviction_policy(EvictionPolicy::Fifo);
        assert_eq!(
            config,
            CacheConfig {
                max_entries: Some(2),
                max_total_bytes: None,
                eviction_policy: EvictionPolicy::Fifo,
            }
        );
    }

    #[test]
    fn zero_bounds_are_rejected() {
        assert_eq!(
            CacheConfig::default().with_max_entries(0).validate(),
            Err(ConfigError::ZeroBound {
                option: "max-entries"
            })
        );
        assert_eq!(
            CacheConfig::default().with_max_total_bytes(0).validate(),
            Err(ConfigError::ZeroBound {
                option: "max-total-bytes"
            })
        );
    }

    #[test]
    fn toml_uses_kebab_case_and_fills_missing_fields() {
        let config: CacheConfig =
            toml::from_str("max-entries = 8\neviction-policy = \"fifo\"\n").expect("parse toml");
        assert_eq!(config.max_entries, Some(8));
        assert_eq!(config.max_total_bytes, Some(DEFAULT_MAX_TOTAL_BYTES));
        assert_eq!(config.eviction_policy, EvictionPolicy::Fifo);
    }

    #[test]
    fn json_accepts_camel_case_aliases_and_null_bounds() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"maxEntries": null, "maxTotalBytes": 1024, "evictionPolicy": "lru"}"#,
        )
        .expect("parse json");
        assert_eq!(
            config,
            CacheConfig {
                max_entries: None,
                max_total_bytes: Some(1024),
                eviction_policy: EvictionPolicy::Lru,
            }
        );
    }
}
