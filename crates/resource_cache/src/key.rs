//! Cache key type.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Opaque resource identifier, compared verbatim.
///
/// No normalization is applied: `"https://a/x"` and `"https://a/x/"` are different keys. Clones
/// share one allocation.
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Creates a key from any string-like value.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref()))
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(value: &CacheKey) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_compared_verbatim() {
        assert_eq!(CacheKey::from("img/a.png"), CacheKey::new("img/a.png"));
        assert_ne!(CacheKey::from("img/a.png"), CacheKey::from("img/a.png/"));
        assert_ne!(CacheKey::from("IMG/a.png"), CacheKey::from("img/a.png"));
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let key = CacheKey::from("https://cdn.example/logo.png");
        let json = serde_json::to_string(&key).expect("serialize key");
        assert_eq!(json, "\"https://cdn.example/logo.png\"");
        let back: CacheKey = serde_json::from_str(&json).expect("deserialize key");
        assert_eq!(back.as_str(), "https://cdn.example/logo.png");
    }
}
