//! Pending payment contexts
//!
//! Ephemeral records holding what finalization needs to turn a reference
//! into a ledger entry. They live in the ephemeral store, so a context
//! created in one browsing context is invisible to another.

use crate::error::PaywallError;
use crate::keys;
use crate::types::{Amount, PaymentMethod, Reference};
use chrono::{DateTime, Utc};
use kambe_store::{JsonStoreExt, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inputs captured when a payment is initiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayment {
    pub reference: Reference,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Consultation price when the payment was initiated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_price: Option<Amount>,
    pub created_at: DateTime<Utc>,
}

/// Repository of pending contexts keyed by reference
#[derive(Debug, Clone)]
pub struct PendingPayments {
    ephemeral: Arc<dyn KeyValueStore>,
}

impl PendingPayments {
    pub fn new(ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { ephemeral }
    }

    /// Store `pending` under its reference
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn put(&self, pending: &PendingPayment) -> Result<(), PaywallError> {
        self.ephemeral
            .write_json(&keys::pending(&pending.reference), pending)?;
        Ok(())
    }

    /// Context for `reference`, if present and readable
    #[must_use]
    pub fn get(&self, reference: &Reference) -> Option<PendingPayment> {
        self.ephemeral.read_json_or(&keys::pending(reference), None)
    }

    /// Drop the context for `reference`
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn remove(&self, reference: &Reference) -> Result<(), PaywallError> {
        self.ephemeral.delete(&keys::pending(reference))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kambe_store::MemoryStore;

    #[test]
    fn put_get_remove() {
        let repo = PendingPayments::new(Arc::new(MemoryStore::new()));
        let reference = Reference::new("r-1");
        let pending = PendingPayment {
            reference: reference.clone(),
            amount: 200,
            method: PaymentMethod::Amanata,
            phone: "90000000".to_string(),
            details: None,
            expected_price: Some(200),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        repo.put(&pending).unwrap();
        assert_eq!(repo.get(&reference), Some(pending));

        repo.remove(&reference).unwrap();
        assert_eq!(repo.get(&reference), None);
    }

    #[test]
    fn unreadable_context_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("kambegoye_pending_r-2", "{oops".to_string()).unwrap();
        let repo = PendingPayments::new(store);
        assert_eq!(repo.get(&Reference::new("r-2")), None);
    }
}
