//! Redirect URL contract between the paywall and the gateway page
//!
//! ```text
//! /payment/simulation?ref=R&amount=N&method=M&phone=P[&details=D]
//! /payment/callback?ref=R&amount=N&phone=P&method=M[&details=D]
//! /payment?error=cancel
//! ```
//!
//! The payment parameters ride along in the URL so a payment started in one
//! browsing context can be completed in another. Callbacks also accept the
//! reference as `transaction_id` or `reference`.

use crate::error::PaywallError;
use crate::types::{Amount, Reference};
use serde::{Deserialize, Serialize};

/// Gateway page path
pub const SIMULATION_PATH: &str = "/payment/simulation";

/// Return path after confirmation
pub const CALLBACK_PATH: &str = "/payment/callback";

/// Return path after cancellation
pub const CANCEL_PATH: &str = "/payment";

/// Query of the gateway page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationQuery {
    #[serde(rename = "ref")]
    pub reference: Reference,
    pub amount: Amount,
    /// Raw method label; parsed when the payment is finalized
    pub method: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Query of the callback page
///
/// Only the reference is mandatory; a bare `?ref=R` callback relies on the
/// pending context of the current browsing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "ref", alias = "transaction_id", alias = "reference")]
    pub reference: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&SimulationQuery> for CallbackQuery {
    fn from(query: &SimulationQuery) -> Self {
        Self {
            reference: query.reference.clone(),
            amount: Some(query.amount),
            phone: Some(query.phone.clone()),
            method: Some(query.method.clone()),
            details: query.details.clone(),
        }
    }
}

/// Build `{base}{path}?{query}`
///
/// # Errors
/// Returns `PaywallError::InvalidRedirect` if the query cannot be encoded
pub fn build<Q: Serialize>(base_url: &str, path: &str, query: &Q) -> Result<String, PaywallError> {
    let encoded =
        serde_urlencoded::to_string(query).map_err(|e| PaywallError::InvalidRedirect(e.to_string()))?;
    Ok(format!("{base_url}{path}?{encoded}"))
}

/// Gateway page target for a payment
///
/// # Errors
/// Returns `PaywallError::InvalidRedirect` if the query cannot be encoded
pub fn simulation_target(base_url: &str, query: &SimulationQuery) -> Result<String, PaywallError> {
    build(base_url, SIMULATION_PATH, query)
}

/// Callback target after the user confirmed
///
/// # Errors
/// Returns `PaywallError::InvalidRedirect` if the query cannot be encoded
pub fn callback_target(base_url: &str, query: &CallbackQuery) -> Result<String, PaywallError> {
    build(base_url, CALLBACK_PATH, query)
}

/// Target after the user cancelled
#[must_use]
pub fn cancel_target(base_url: &str) -> String {
    format!("{base_url}{CANCEL_PATH}?error=cancel")
}

/// Split a URI or bare query into `(path, query)`
///
/// Any scheme and authority are kept in the path part.
#[must_use]
pub fn split(uri: &str) -> (&str, &str) {
    let uri = uri.split('#').next().unwrap_or(uri);
    match uri.split_once('?') {
        Some((path, query)) => (path, query),
        None if uri.contains('=') => ("", uri),
        None => (uri, ""),
    }
}

/// Parse the gateway page query from a URI or bare query string
///
/// # Errors
/// Returns `PaywallError::InvalidRedirect` on a missing or malformed field
pub fn parse_simulation(uri: &str) -> Result<SimulationQuery, PaywallError> {
    let (_, query) = split(uri);
    serde_urlencoded::from_str(query).map_err(|e| PaywallError::InvalidRedirect(e.to_string()))
}

/// Parse the callback query from a URI or bare query string
///
/// # Errors
/// Returns `PaywallError::InvalidRedirect` when no reference is present or a
/// field is malformed
pub fn parse_callback(uri: &str) -> Result<CallbackQuery, PaywallError> {
    let (_, query) = split(uri);
    serde_urlencoded::from_str(query).map_err(|e| PaywallError::InvalidRedirect(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn query() -> SimulationQuery {
        SimulationQuery {
            reference: Reference::new("R1"),
            amount: 200,
            method: "Mynita".to_string(),
            phone: "90000000".to_string(),
            details: None,
        }
    }

    #[test]
    fn simulation_target_layout() {
        let target = simulation_target("", &query()).unwrap();
        assert_eq!(
            target,
            "/payment/simulation?ref=R1&amount=200&method=Mynita&phone=90000000"
        );
    }

    #[test]
    fn callback_target_layout_with_details() {
        let mut q = query();
        q.details = Some("Panier: 2 x Ciment".to_string());
        let target = callback_target("https://kambegoye.com", &CallbackQuery::from(&q)).unwrap();
        assert_eq!(
            target,
            "https://kambegoye.com/payment/callback?ref=R1&amount=200&phone=90000000&method=Mynita&details=Panier%3A+2+x+Ciment"
        );
    }

    #[test]
    fn parse_roundtrips_details() {
        let mut q = query();
        q.details = Some("Panier: 2 x Ciment & sable".to_string());
        let target = simulation_target("", &q).unwrap();
        assert_eq!(parse_simulation(&target).unwrap(), q);
    }

    #[test]
    fn callback_accepts_reference_aliases() {
        let a = parse_callback("/payment/callback?transaction_id=R9").unwrap();
        let b = parse_callback("reference=R9").unwrap();
        assert_eq!(a.reference, Reference::new("R9"));
        assert_eq!(b.reference, Reference::new("R9"));
        assert_eq!(a.amount, None);
    }

    #[test]
    fn missing_reference_is_rejected() {
        assert!(parse_callback("/payment/callback?amount=200").is_err());
        assert!(parse_simulation("/payment/simulation?ref=R1&amount=abc&method=x&phone=1").is_err());
    }

    #[test]
    fn cancel_target_layout() {
        assert_eq!(cancel_target(""), "/payment?error=cancel");
    }

    #[test]
    fn split_handles_fragments_and_bare_queries() {
        assert_eq!(split("/payment/callback?ref=1#top"), ("/payment/callback", "ref=1"));
        assert_eq!(split("ref=1"), ("", "ref=1"));
        assert_eq!(split("/payment"), ("/payment", ""));
    }
}
