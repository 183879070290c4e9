//! Ephemeral store with time-to-live eviction using moka
//!
//! Stands in for tab-scoped storage when there is no browser session to
//! bound its lifetime: every entry ages out `ttl` after it was last written.

use crate::{KeyValueStore, StoreError};
use moka::sync::Cache;
use std::time::Duration;

/// Upper bound on entries; abandoned payment contexts never grow past this.
const DEFAULT_CAPACITY: u64 = 10_000;

/// TTL-bounded ephemeral key-value store
#[derive(Debug, Clone)]
pub struct ExpiringStore {
    inner: Cache<String, String>,
    ttl: Duration,
}

impl ExpiringStore {
    /// Create store whose entries expire `ttl` after insertion
    #[inline]
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, ttl)
    }

    /// Create store with explicit capacity and TTL
    #[inline]
    #[must_use]
    pub fn with_capacity(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    /// Configured time-to-live
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl KeyValueStore for ExpiringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.get(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.inner.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.iter().map(|(k, _)| (*k).clone()).collect())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_deletes() {
        let store = ExpiringStore::new(Duration::from_secs(60));
        store.set("sim_status_r1", "success".to_string()).unwrap();
        assert_eq!(store.get("sim_status_r1").unwrap().as_deref(), Some("success"));

        store.delete("sim_status_r1").unwrap();
        assert_eq!(store.get("sim_status_r1").unwrap(), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let store = ExpiringStore::new(Duration::from_millis(50));
        store.set("pending", "ctx".to_string()).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(store.get("pending").unwrap(), None);
    }

    #[test]
    fn clear_drops_everything() {
        let store = ExpiringStore::new(Duration::from_secs(60));
        store.set("a", "1".to_string()).unwrap();
        store.set("b", "2".to_string()).unwrap();
        store.clear().unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert!(store.keys().unwrap().is_empty());
    }
}
