//! Request outcomes and presentation-facing resource states.

use resource_cache::CacheEntry;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of one request. Every waiter of a retrieval receives a clone of the same value.
pub enum FetchResult {
    /// The payload, either from the cache or from a completed retrieval.
    Success(CacheEntry),
    /// The request failed; see [`FetchError`].
    Failure(FetchError),
}

impl FetchResult {
    /// Returns `true` for [`FetchResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the entry on success.
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Success(entry) => Some(entry),
            Self::Failure(_) => None,
        }
    }

    /// Returns the error on failure.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Converts into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the contained [`FetchError`] for [`FetchResult::Failure`].
    pub fn into_result(self) -> Result<CacheEntry, FetchError> {
        match self {
            Self::Success(entry) => Ok(entry),
            Self::Failure(error) => Err(error),
        }
    }
}

impl From<FetchResult> for Result<CacheEntry, FetchError> {
    fn from(value: FetchResult) -> Self {
        value.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a presentation layer should render for a key.
pub enum ResourceState {
    /// Nothing cached and nothing in flight.
    Absent,
    /// A retrieval is in progress.
    Loading,
    /// The payload is available.
    Loaded(CacheEntry),
    /// The request failed.
    Failed(FetchError),
}

impl ResourceState {
    /// Returns `true` while a retrieval is pending.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl From<FetchResult> for ResourceState {
    fn from(value: FetchResult) -> Self {
        match value {
            FetchResult::Success(entry) => Self::Loaded(entry),
            FetchResult::Failure(error) => Self::Failed(error),
        }
    }
}
