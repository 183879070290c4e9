//! In-memory store with an optional byte quota

use crate::{KeyValueStore, StoreError};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory key-value store.
///
/// Models a browser storage area: synchronous, ordered writes and an optional
/// size quota counted as the sum of key and value lengths in bytes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes growing it past `limit` bytes
    #[inline]
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(limit),
        }
    }

    /// Bytes currently held
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Number of keys held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store holds no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write();

        if let Some(limit) = self.quota {
            let current: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let requested = current - replaced + key.len() + value.len();
            if requested > limit {
                return Err(StoreError::QuotaExceeded { requested, limit });
            }
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string()).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.delete("a").unwrap();
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345".to_string()).unwrap();

        let err = store.set("other", "123456789".to_string()).unwrap_err();
        assert!(err.is_quota());
        // Rejected write leaves prior state intact
        assert_eq!(store.get("k").unwrap().as_deref(), Some("12345"));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn quota_counts_replacement_not_addition() {
        let store = MemoryStore::with_quota(8);
        store.set("k", "1234567".to_string()).unwrap();
        store.set("k", "7654321".to_string()).unwrap();
        assert_eq!(store.used_bytes(), 8);
    }

    #[test]
    fn zero_quota_behaves_as_disabled_storage() {
        let store = MemoryStore::with_quota(0);
        assert!(store.set("k", String::new()).is_err());
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn usage_never_exceeds_quota(writes in prop::collection::vec(("[a-d]", "[a-z]{0,12}"), 0..40)) {
            let store = MemoryStore::with_quota(32);
            for (k, v) in writes {
                let _ = store.set(&k, v);
                prop_assert!(store.used_bytes() <= 32);
            }
        }
    }
}
