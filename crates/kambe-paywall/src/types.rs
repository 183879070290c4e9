//! Core types for the paywall
//!
//! Defines:
//! - Payment references
//! - Payment methods and transaction status
//! - Ledger transactions

use crate::error::UnknownMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Amount in the smallest currency unit (FCFA has no subunit)
pub type Amount = u64;

/// Opaque identifier correlating a payment initiation with its confirmation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Reference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Reference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Payment channel
///
/// Closed set: the two mobile-money operators and cash handed to an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentMethod {
    /// Moov mobile money
    Mynita,
    /// Airtel mobile money
    Amanata,
    /// Cash collected in person
    Cash,
}

impl PaymentMethod {
    /// Every supported method
    pub const ALL: [PaymentMethod; 3] = [Self::Mynita, Self::Amanata, Self::Cash];

    /// Display label, also the serialized form
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mynita => "Mynita",
            Self::Amanata => "Amanata",
            Self::Cash => "Cash",
        }
    }

    /// Check if the method goes through a mobile-money operator
    #[inline]
    #[must_use]
    pub fn is_mobile_money(self) -> bool {
        matches!(self, Self::Mynita | Self::Amanata)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mynita" => Ok(Self::Mynita),
            "amanata" => Ok(Self::Amanata),
            "cash" | "espèces" | "especes" => Ok(Self::Cash),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = UnknownMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        value.label().to_string()
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Initiated, not confirmed
    Pending,
    /// Confirmed
    Success,
    /// Declined or cancelled
    Failed,
}

/// One payment recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Payment reference, unique within the ledger
    pub id: Reference,
    /// Amount paid
    pub amount: Amount,
    /// Instant the payment was recorded
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    /// Status at recording time
    pub status: TxStatus,
    /// Payment channel
    pub method: PaymentMethod,
    /// Payer contact as typed by the client
    #[serde(default)]
    pub client_phone: String,
    /// Free-text description, e.g. cart contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Transaction {
    /// Create a confirmed transaction
    #[must_use]
    pub fn success(
        id: Reference,
        amount: Amount,
        method: PaymentMethod,
        client_phone: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount,
            timestamp,
            status: TxStatus::Success,
            method,
            client_phone: client_phone.into(),
            details: None,
        }
    }

    /// With details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }
}
