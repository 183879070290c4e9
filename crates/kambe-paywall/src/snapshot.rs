//! Full data export and import

use crate::directory::Worker;
use crate::settings::SystemSettings;
use crate::types::Transaction;
use serde::{Deserialize, Serialize};

/// Everything an admin backup contains
///
/// Missing sections in an imported document leave the current data as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<Vec<Worker>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SystemSettings>,
}

impl DataSnapshot {
    /// Parse a backup document
    ///
    /// # Errors
    /// Fails on malformed JSON
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    /// Fails only if a value cannot be encoded
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
