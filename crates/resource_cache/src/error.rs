//! Cache configuration errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Rejected [`CacheConfig`](crate::CacheConfig) values.
pub enum ConfigError {
    /// A bound was set to zero, which would make every insertion fail.
    #[error("{option} must be greater than zero (omit it for no bound)")]
    ZeroBound {
        /// Option name as it appears in configuration files.
        option: &'static str,
    },
}
