//! Storage key layout
//!
//! Durable keys survive restarts. Ephemeral keys are scoped to one browsing
//! context (or one TTL window when no such context exists).

use crate::types::Reference;

/// Durable: JSON array of ledger transactions, most recent first
pub const TRANSACTIONS: &str = "kambegoye_transactions";

/// Durable: JSON object of system settings
pub const SETTINGS: &str = "kambegoye_settings";

/// Durable: JSON object with admin username and password
pub const ADMIN_AUTH: &str = "kambegoye_admin_auth";

/// Durable: JSON array of worker profiles
pub const WORKERS: &str = "kambegoye_workers";

/// Ephemeral: session start instant in epoch milliseconds
pub const PAID_SESSION: &str = "kambegoye_paid_session";

const PENDING_PREFIX: &str = "kambegoye_pending_";
const DECISION_PREFIX: &str = "sim_status_";

/// Ephemeral: pending payment context for `reference`
#[must_use]
pub fn pending(reference: &Reference) -> String {
    format!("{PENDING_PREFIX}{reference}")
}

/// Ephemeral: simulated gateway decision for `reference`
#[must_use]
pub fn decision(reference: &Reference) -> String {
    format!("{DECISION_PREFIX}{reference}")
}
