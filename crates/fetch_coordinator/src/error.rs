//! Fetch and configuration errors.

use resource_cache::{CacheKey, ConfigError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
/// Failure reported by a retrieval function.
///
/// Cloneable so a single failure can be handed to every waiter of the retrieval.
pub struct RetrievalError {
    message: String,
}

impl RetrievalError {
    /// Creates an error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(value: std::io::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for RetrievalError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RetrievalError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Discriminant of [`FetchError`], for callers that only branch on the kind.
pub enum FetchErrorKind {
    /// See [`FetchError::InvalidKey`].
    InvalidKey,
    /// See [`FetchError::RetrievalFailed`].
    RetrievalFailed,
    /// See [`FetchError::Cancelled`].
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Why a request did not produce a cache entry.
pub enum FetchError {
    /// The key was refused before any retrieval was attempted.
    #[error("invalid key `{key}`: {reason}")]
    InvalidKey {
        /// Refused key.
        key: CacheKey,
        /// Validator message.
        reason: String,
    },
    /// The retrieval function failed. Nothing was cached; the next request retries.
    #[error("retrieval of `{key}` failed: {source}")]
    RetrievalFailed {
        /// Requested key.
        key: CacheKey,
        /// Error returned by the retrieval function.
        source: RetrievalError,
    },
    /// This waiter withdrew before the retrieval resolved.
    #[error("request for `{key}` was cancelled")]
    Cancelled {
        /// Requested key.
        key: CacheKey,
    },
}

impl FetchError {
    /// Returns the error kind.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::InvalidKey { .. } => FetchErrorKind::InvalidKey,
            Self::RetrievalFailed { .. } => FetchErrorKind::RetrievalFailed,
            Self::Cancelled { .. } => FetchErrorKind::Cancelled,
        }
    }

    /// Key the failed request was made for.
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::InvalidKey { key, .. }
            | Self::RetrievalFailed { key, .. }
            | Self::Cancelled { key } => key,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Coordinator configuration failures.
pub enum CoordinatorConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// File path.
        path: String,
        /// I/O error text.
        message: String,
    },
    /// The configuration text is not valid TOML/JSON for
    /// [`CoordinatorConfig`](crate::CoordinatorConfig).
    #[error("failed to parse {origin}: {message}")]
    Parse {
        /// File path, or `<toml>` / `<json>` for in-memory input.
        origin: String,
        /// Parser error text.
        message: String,
    },
    /// The file extension is neither `.toml` nor `.json`.
    #[error("unsupported config format for {path} (expected .toml or .json)")]
    UnsupportedFormat {
        /// File path.
        path: String,
    },
    /// `shards` was zero.
    #[error("shards must be greater than zero")]
    ZeroShards,
    /// Cache bounds were rejected.
    #[error(transparent)]
    Cache(#[from] ConfigError),
}
