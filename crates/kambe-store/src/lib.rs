//! Kambegoye Store - key-value storage adapters
//!
//! Every piece of paywall state lives behind the [`KeyValueStore`]
//! capability trait so the state machine can be built over:
//! - [`MemoryStore`] for tests and tab-scoped state (optionally quota-limited)
//! - [`FileStore`] for durable state that survives restarts
//! - [`ExpiringStore`] for ephemeral state that ages out after a TTL
//!
//! Values are opaque strings; [`JsonStoreExt`] layers JSON encoding and the
//! parse-with-fallback read used throughout the paywall.
//!
//! # Example
//!
//! ```rust
//! use kambe_store::{JsonStoreExt, KeyValueStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.write_json("settings", &serde_json::json!({"consultationPrice": 200})).unwrap();
//!
//! let price: serde_json::Value = store.read_json_or("settings", serde_json::Value::Null);
//! assert_eq!(price["consultationPrice"], 200);
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod expiring;
pub mod file;
pub mod json;
pub mod memory;

pub use error::StoreError;
pub use expiring::ExpiringStore;
pub use file::FileStore;
pub use json::JsonStoreExt;
pub use memory::MemoryStore;

/// Capability set over one logical storage area.
///
/// Implementations must be usable from behind an `Arc<dyn KeyValueStore>`;
/// writes within one store are applied in call order.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`StoreError::QuotaExceeded`] when the write does not fit, or an
    /// I/O error for persistent backends.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be written.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List every key currently present.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be read.
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every key.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backend cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
