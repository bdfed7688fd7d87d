//! Coordinator configuration and file loading.

use std::{fs, path::Path};

use resource_cache::{CacheConfig, EvictionPolicy};
use serde::{Deserialize, Serialize};

use crate::{error::CoordinatorConfigError, executor::ExecutorKind, notify::NotifyTarget};

/// Default number of in-flight shards.
pub const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
/// Full configuration surface of a [`FetchCoordinator`](crate::FetchCoordinator).
///
/// Cache bounds sit at the top level next to the coordinator options:
///
/// ```toml
/// max-entries = 512
/// max-total-bytes = 33554432
/// eviction-policy = "lru"
/// notify-context = "queued"
/// executor = "thread"
/// shards = 32
/// ```
///
/// camelCase spellings (`maxEntries`, `notifyContext`, ...) are accepted too.
pub struct CoordinatorConfig {
    /// Cache bounds and eviction policy.
    #[serde(flatten)]
    pub cache: CacheConfig,
    /// Where completion callbacks run.
    #[serde(alias = "notifyContext")]
    pub notify_context: NotifyTarget,
    /// Where retrievals run.
    pub executor: ExecutorKind,
    /// Number of in-flight shards.
    pub shards: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            notify_context: NotifyTarget::Immediate,
            executor: ExecutorKind::Thread,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CoordinatorConfig {
    /// Replaces the cache section.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the entry-count bound.
    pub fn with_max_entries(mut self, max_entries: impl Into<Option<usize>>) -> Self {
        self.cache.max_entries = max_entries.into();
        self
    }

    /// Sets the total payload bound.
    pub fn with_max_total_bytes(mut self, max_total_bytes: impl Into<Option<usize>>) -> Self {
        self.cache.max_total_bytes = max_total_bytes.into();
        self
    }

    /// Sets the eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.cache.eviction_policy = policy;
        self
    }

    /// Sets the notify context.
    pub fn with_notify_context(mut self, target: NotifyTarget) -> Self {
        self.notify_context = target;
        self
    }

    /// Sets the retrieval executor.
    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    /// Sets the in-flight shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Checks cache bounds and shard count.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorConfigError::Cache`] for zero cache bounds and
    /// [`CoordinatorConfigError::ZeroShards`] for `shards = 0`.
    pub fn validate(&self) -> Result<(), CoordinatorConfigError> {
        self.cache.validate()?;
        if self.shards == 0 {
            return Err(CoordinatorConfigError::ZeroShards);
        }
        Ok(())
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorConfigError::Parse`] for malformed input and any
    /// [`validate`](Self::validate) error.
    pub fn from_toml_str(body: &str) -> Result<Self, CoordinatorConfigError> {
        parse_validated(body, "<toml>", |raw| {
            toml::from_str(raw).map_err(|err| err.to_string())
        })
    }

    /// Parses and validates JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorConfigError::Parse`] for malformed input and any
    /// [`validate`](Self::validate) error.
    pub fn from_json_str(body: &str) -> Result<Self, CoordinatorConfigError> {
        parse_validated(body, "<json>", |raw| {
            serde_json::from_str(raw).map_err(|err| err.to_string())
        })
    }

    /// Reads, parses, and validates a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Missing or unreadable files report [`CoordinatorConfigError::Read`], other extensions
    /// [`CoordinatorConfigError::UnsupportedFormat`], and malformed contents
    /// [`CoordinatorConfigError::Parse`] naming the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoordinatorConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let body = fs::read_to_string(path).map_err(|err| CoordinatorConfigError::Read {
            path: origin.clone(),
            message: err.to_string(),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => parse_validated(&body, &origin, |raw| {
                toml::from_str(raw).map_err(|err| err.to_string())
            }),
            Some("json") => parse_validated(&body, &origin, |raw| {
                serde_json::from_str(raw).map_err(|err| err.to_string())
            }),
            _ => Err(CoordinatorConfigError::UnsupportedFormat { path: origin }),
        }
    }
}

fn parse_validated<F>(
    body: &str,
    origin: &str,
    parse: F,
) -> Result<CoordinatorConfig, CoordinatorConfigError>
where
    F: FnOnce(&str) -> Result<CoordinatorConfig, String>,
{
    let config = parse(body).map_err(|message| CoordinatorConfigError::Parse {
        origin: origin.to_string(),
        message,
    })?;
    config.validate()?;
    Ok(config)
}
