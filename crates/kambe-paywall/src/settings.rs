//! System settings and admin credential records

use crate::error::PaywallError;
use crate::keys;
use crate::types::Amount;
use kambe_store::{JsonStoreExt, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Platform-wide settings record
///
/// Fields this crate does not know about are kept as-is across updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    /// Price of one consultation session
    pub consultation_price: Amount,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SystemSettings {
    /// Settings with the given price and no other toggles
    #[must_use]
    pub fn with_price(consultation_price: Amount) -> Self {
        Self {
            consultation_price,
            extra: serde_json::Map::new(),
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub consultation_price: Option<Amount>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SettingsPatch {
    /// Patch changing only the consultation price
    #[must_use]
    pub fn price(consultation_price: Amount) -> Self {
        Self {
            consultation_price: Some(consultation_price),
            ..Self::default()
        }
    }
}

/// Settings repository over the durable store
#[derive(Debug, Clone)]
pub struct Settings {
    durable: Arc<dyn KeyValueStore>,
    default_price: Amount,
}

impl Settings {
    pub fn new(durable: Arc<dyn KeyValueStore>, default_price: Amount) -> Self {
        Self {
            durable,
            default_price,
        }
    }

    /// Current settings, or defaults when the record is missing or unreadable
    #[must_use]
    pub fn get(&self) -> SystemSettings {
        self.durable
            .read_json_or(keys::SETTINGS, SystemSettings::with_price(self.default_price))
    }

    /// Current consultation price
    #[inline]
    #[must_use]
    pub fn consultation_price(&self) -> Amount {
        self.get().consultation_price
    }

    /// Merge `patch` into the stored record
    ///
    /// # Errors
    /// Rejects a zero price; propagates storage faults, including a stored
    /// record that cannot be decoded
    pub fn update(&self, patch: SettingsPatch) -> Result<SystemSettings, PaywallError> {
        let mut settings = self
            .durable
            .read_json(keys::SETTINGS)?
            .unwrap_or_else(|| SystemSettings::with_price(self.default_price));
        if let Some(price) = patch.consultation_price {
            check_price(price)?;
            settings.consultation_price = price;
        }
        settings.extra.extend(patch.extra);
        self.durable.write_json(keys::SETTINGS, &settings)?;
        tracing::info!(price = settings.consultation_price, "settings updated");
        Ok(settings)
    }

    /// Replace the stored record
    ///
    /// # Errors
    /// Rejects a zero price; propagates storage faults
    pub fn replace(&self, settings: &SystemSettings) -> Result<(), PaywallError> {
        check_price(settings.consultation_price)?;
        self.durable.write_json(keys::SETTINGS, settings)?;
        Ok(())
    }

    /// Write defaults if no record exists
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn seed(&self) -> Result<(), PaywallError> {
        if self.durable.get(keys::SETTINGS)?.is_none() {
            self.replace(&SystemSettings::with_price(self.default_price))?;
        }
        Ok(())
    }
}

fn check_price(price: Amount) -> Result<(), PaywallError> {
    if price == 0 {
        return Err(PaywallError::InvalidRequest(
            "consultation price must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Admin login record, stored in plaintext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

/// Admin credential repository
#[derive(Debug, Clone)]
pub struct AdminAuth {
    durable: Arc<dyn KeyValueStore>,
}

impl AdminAuth {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self { durable }
    }

    fn load(&self) -> AdminCredentials {
        self.durable
            .read_json_or(keys::ADMIN_AUTH, AdminCredentials::default())
    }

    /// Compare against the stored credentials
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let stored = self.load();
        stored.username == username && stored.password == password
    }

    /// Replace the stored password
    ///
    /// # Errors
    /// Rejects an empty password; propagates storage faults
    pub fn update_password(&self, password: &str) -> Result<(), PaywallError> {
        if password.is_empty() {
            return Err(PaywallError::InvalidRequest(
                "password must not be empty".to_string(),
            ));
        }
        let mut creds: AdminCredentials = self
            .durable
            .read_json(keys::ADMIN_AUTH)?
            .unwrap_or_default();
        creds.password = password.to_string();
        self.durable.write_json(keys::ADMIN_AUTH, &creds)?;
        tracing::info!(username = %creds.username, "admin password changed");
        Ok(())
    }

    /// Write default credentials if no record exists
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn seed(&self) -> Result<(), PaywallError> {
        if self.durable.get(keys::ADMIN_AUTH)?.is_none() {
            self.durable
                .write_json(keys::ADMIN_AUTH, &AdminCredentials::default())?;
        }
        Ok(())
    }
}
