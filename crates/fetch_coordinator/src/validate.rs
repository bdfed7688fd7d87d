//! Key validation applied before any cache lookup or retrieval.

use std::sync::Arc;

use resource_cache::CacheKey;

/// Decides whether a key can name a retrievable resource. `Err` carries the reason.
pub type KeyValidator = Arc<dyn Fn(&CacheKey) -> Result<(), String> + Send + Sync>;

/// Default rule: keys must contain a non-whitespace character and no control characters.
///
/// # Errors
///
/// Returns a human-readable reason for rejected keys.
pub fn default_key_rule(key: &CacheKey) -> Result<(), String> {
    let raw = key.as_str();
    if raw.trim().is_empty() {
        return Err("key is empty".to_string());
    }
    if raw.chars().any(char::is_control) {
        return Err("key contains control characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_accepts_locators_verbatim() {
        for raw in ["https://cdn.example/a b.png", "asset:42", "  padded  "] {
            assert_eq!(default_key_rule(&CacheKey::from(raw)), Ok(()), "{raw}");
        }
    }

    #[test]
    fn default_rule_rejects_blank_and_control_characters() {
        for raw in ["", "   ", "line\nbreak", "tab\there"] {
            assert!(default_key_rule(&CacheKey::from(raw)).is_err(), "{raw:?}");
        }
    }
}
