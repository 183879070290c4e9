//! Error types for storage backends

use std::path::PathBuf;

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Write rejected because the store is full
    #[error("storage quota exceeded: {requested} bytes requested, limit {limit}")]
    QuotaExceeded {
        /// Total bytes the store would hold after the write
        requested: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Backend disabled or not reachable
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Durable file exists but cannot be decoded
    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        /// File that failed to decode
        path: PathBuf,
        /// Decoder error
        source: serde_json::Error,
    },

    /// Stored value exists but does not decode to the expected type
    #[error("malformed value under {key}: {source}")]
    Malformed {
        /// Key holding the value
        key: String,
        /// Decoder error
        source: serde_json::Error,
    },

    /// Filesystem failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if this is a quota failure
    #[inline]
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Check if the caller can keep going with degraded behaviour.
    ///
    /// Quota and availability failures affect a single write; a corrupt file
    /// or malformed value means the durable state itself is unusable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Corrupt { .. } | Self::Malformed { .. })
    }
}
