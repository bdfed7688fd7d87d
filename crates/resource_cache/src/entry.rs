//! Immutable cached payloads.

use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

#[derive(Clone)]
/// Immutable byte payload stored in a [`ResourceCache`](crate::ResourceCache).
///
/// The bytes are moved into a shared allocation on construction and never change afterwards.
/// Cloning an entry hands out another read-only view of the same allocation.
pub struct CacheEntry {
    bytes: Arc<[u8]>,
    created_at_unix_ms: u64,
}

impl CacheEntry {
    /// Wraps `bytes` in a new entry stamped with the current time.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            created_at_unix_ms: unix_time_ms_now(),
        }
    }

    /// Returns the payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a shared handle to the payload allocation.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Payload size in bytes, as charged against `max_total_bytes`.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Creation time in unix milliseconds.
    pub fn created_at_unix_ms(&self) -> u64 {
        self.created_at_unix_ms
    }

    /// Returns `true` when both entries share the same payload allocation.
    pub fn ptr_eq(&self, other: &CacheEntry) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.bytes == other.bytes
    }
}

impl Eq for CacheEntry {}

impl AsRef<[u8]> for CacheEntry {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("len", &self.bytes.len())
            .field("created_at_unix_ms", &self.created_at_unix_ms)
            .finish()
    }
}

fn unix_time_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_payload_allocation() {
        let entry = CacheEntry::new(vec![1, 2, 3]);
        let clone = entry.clone();
        assert!(entry.ptr_eq(&clone));
        assert_eq!(clone.bytes(), &[1, 2, 3]);
        assert_eq!(clone.len(), 3);
    }

    #[test]
    fn equal_bytes_compare_equal_without_sharing() {
        let a = CacheEntry::new(b"same".to_vec());
        let b = CacheEntry::new(&b"same"[..]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn debug_output_omits_payload_bytes() {
        let entry = CacheEntry::new(vec![0xAB; 4]);
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("len: 4"));
        assert!(!rendered.contains("171"));
    }
}
