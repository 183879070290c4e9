//! Error types for the paywall
//!
//! Payment outcomes (pending, declined, unknown reference) are not errors;
//! they are reported through [`crate::FinalizeOutcome`]. The variants here
//! cover storage faults, malformed input and configuration problems.

use kambe_store::StoreError;

/// Main paywall error type
#[derive(Debug, thiserror::Error)]
pub enum PaywallError {
    /// Storage backend failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Payment method label not in the supported set
    #[error(transparent)]
    UnknownMethod(#[from] UnknownMethod),

    /// Redirect URL or query string could not be built or parsed
    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),

    /// Payment request rejected before reaching the gateway
    #[error("invalid payment request: {0}")]
    InvalidRequest(String),

    /// Gateway could not be reached or answered nonsense
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl PaywallError {
    /// Check if the error comes from the storage layer
    #[inline]
    #[must_use]
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Check if the operation may succeed when retried unchanged
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_recoverable(),
            Self::Gateway(_) => true,
            Self::UnknownMethod(_)
            | Self::InvalidRedirect(_)
            | Self::InvalidRequest(_)
            | Self::Config(_) => false,
        }
    }
}

/// Unrecognised payment method label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment method: {0}")]
pub struct UnknownMethod(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paywall_error_display() {
        let err = PaywallError::InvalidRequest("empty phone".to_string());
        assert!(err.to_string().contains("invalid payment request"));

        let err: PaywallError = UnknownMethod("Orange".to_string()).into();
        assert_eq!(err.to_string(), "unknown payment method: Orange");
    }

    #[test]
    fn storage_faults_are_retryable() {
        let err: PaywallError = StoreError::QuotaExceeded {
            requested: 10,
            limit: 5,
        }
        .into();
        assert!(err.is_storage_fault());
        assert!(err.is_retryable());

        assert!(!PaywallError::Config("zero duration".to_string()).is_retryable());
        assert!(PaywallError::Gateway("timeout".to_string()).is_retryable());
    }
}
