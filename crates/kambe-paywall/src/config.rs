//! Paywall configuration
//!
//! Everything has a default, so an empty TOML document is a valid config.

use crate::error::PaywallError;
use crate::types::{Amount, PaymentMethod};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted session window
const MAX_SESSION_SECS: u64 = 365 * 24 * 3600;

/// Administrator contact used for payment notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminContact {
    /// WhatsApp number, digits only with country code
    pub phone: String,
    /// Support mailbox
    pub email: String,
}

impl Default for AdminContact {
    fn default() -> Self {
        Self {
            phone: "22797390569".to_string(),
            email: "contact@kambegoye.com".to_string(),
        }
    }
}

/// Paywall configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaywallConfig {
    /// Length of the access window opened by a consultation payment
    pub session_duration_secs: u64,
    /// Consultation price used when no settings record exists
    pub default_consultation_price: Amount,
    /// Method recorded when neither context nor override names one
    pub fallback_method: PaymentMethod,
    /// Lifetime of ephemeral entries when no browsing context bounds them
    pub pending_ttl_secs: u64,
    /// Prefix for redirect targets; empty means site-relative paths
    pub base_url: String,
    /// Currency code shown in reports
    pub currency: String,
    /// Where payment notifications go
    pub admin_contact: AdminContact,
}

impl Default for PaywallConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 300,
            default_consultation_price: 200,
            fallback_method: PaymentMethod::Mynita,
            pending_ttl_secs: 3600,
            base_url: String::new(),
            currency: "XOF".to_string(),
            admin_contact: AdminContact::default(),
        }
    }
}

impl PaywallConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// Returns `PaywallError::Config` on syntax errors or invalid values
    pub fn from_toml_str(raw: &str) -> Result<Self, PaywallError> {
        let config: Self = toml::from_str(raw).map_err(|e| PaywallError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    ///
    /// # Errors
    /// Returns `PaywallError::Config` naming the offending field
    pub fn validate(&self) -> Result<(), PaywallError> {
        if self.session_duration_secs == 0 {
            return Err(PaywallError::Config(
                "session_duration_secs must be positive".to_string(),
            ));
        }
        if self.session_duration_secs > MAX_SESSION_SECS {
            return Err(PaywallError::Config(format!(
                "session_duration_secs must not exceed {MAX_SESSION_SECS}"
            )));
        }
        if self.default_consultation_price == 0 {
            return Err(PaywallError::Config(
                "default_consultation_price must be positive".to_string(),
            ));
        }
        if self.pending_ttl_secs == 0 {
            return Err(PaywallError::Config(
                "pending_ttl_secs must be positive".to_string(),
            ));
        }
        // The session marker lives in the same TTL-bounded ephemeral store
        if self.session_duration_secs > self.pending_ttl_secs {
            return Err(PaywallError::Config(format!(
                "session_duration_secs ({}) must not exceed pending_ttl_secs ({})",
                self.session_duration_secs, self.pending_ttl_secs
            )));
        }
        Ok(())
    }

    /// With session duration
    #[inline]
    #[must_use]
    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration_secs = duration.as_secs();
        self
    }

    /// With default consultation price
    #[inline]
    #[must_use]
    pub fn with_consultation_price(mut self, price: Amount) -> Self {
        self.default_consultation_price = price;
        self
    }

    /// With fallback method
    #[inline]
    #[must_use]
    pub fn with_fallback_method(mut self, method: PaymentMethod) -> Self {
        self.fallback_method = method;
        self
    }

    /// With base URL for redirect targets
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Session window
    #[inline]
    #[must_use]
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    /// Ephemeral entry lifetime
    #[inline]
    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_constants() {
        let config = PaywallConfig::default();
        assert_eq!(config.session_duration_secs, 300);
        assert_eq!(config.default_consultation_price, 200);
        assert_eq!(config.fallback_method, PaymentMethod::Mynita);
        assert_eq!(config.currency, "XOF");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let config = PaywallConfig::from_toml_str("").unwrap();
        assert_eq!(config, PaywallConfig::default());
    }

    #[test]
    fn toml_overrides() {
        let raw = r#"
            session_duration_secs = 600
            fallback_method = "amanata"
            base_url = "https://kambegoye.com"

            [admin_contact]
            phone = "22790000000"
        "#;
        let config = PaywallConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.session_duration(), Duration::from_secs(600));
        assert_eq!(config.fallback_method, PaymentMethod::Amanata);
        assert_eq!(config.admin_contact.phone, "22790000000");
        assert_eq!(config.admin_contact.email, "contact@kambegoye.com");
    }

    #[test]
    fn rejects_zero_duration_and_price() {
        assert!(PaywallConfig::from_toml_str("session_duration_secs = 0").is_err());
        assert!(PaywallConfig::from_toml_str("default_consultation_price = 0").is_err());
        assert!(PaywallConfig::from_toml_str("fallback_method = \"Orange\"").is_err());
    }

    #[test]
    fn session_must_fit_in_pending_ttl() {
        let err = PaywallConfig::from_toml_str(
            "session_duration_secs = 7200\npending_ttl_secs = 3600",
        )
        .unwrap_err();
        assert!(err.to_string().contains("pending_ttl_secs"));

        let config =
            PaywallConfig::from_toml_str("session_duration_secs = 3600\npending_ttl_secs = 3600")
                .unwrap();
        assert_eq!(config.pending_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn builder_trims_base_url() {
        let config = PaywallConfig::new()
            .with_base_url("https://kambegoye.com/")
            .with_session_duration(Duration::from_secs(60));
        assert_eq!(config.base_url, "https://kambegoye.com");
        assert_eq!(config.session_duration_secs, 60);
    }
}
