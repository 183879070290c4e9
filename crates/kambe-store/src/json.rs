//! JSON helpers over any [`KeyValueStore`]

use crate::{KeyValueStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON encoding on top of the raw string capability set.
///
/// Implemented for every store, including `dyn KeyValueStore`.
pub trait JsonStoreExt: KeyValueStore {
    /// Decode the value under `key`.
    ///
    /// Use this in read-modify-write paths so a value that fails to decode
    /// is never overwritten.
    ///
    /// # Errors
    /// - backend read failures
    /// - `StoreError::Malformed` when the stored text is not valid JSON for `T`
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Malformed {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Decode the value under `key`, returning `fallback` when it is missing,
    /// unreadable or malformed.
    ///
    /// For read-only views; a malformed value is logged at `warn`.
    fn read_json_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.read_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!(key, error = %e, "falling back on unreadable value");
                fallback
            }
        }
    }

    /// Encode `value` and store it under `key`.
    ///
    /// # Errors
    /// Fails on encoding errors or when the backend rejects the write.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}
