//! Transaction ledger
//!
//! Durable, most-recent-first record of confirmed payments. Appends are
//! idempotent per reference: recording a reference twice leaves one entry.
//!
//! The ledger is stored as a single JSON array, so an append is a
//! read-modify-write of the whole collection.

use crate::error::PaywallError;
use crate::keys;
use crate::types::{Amount, PaymentMethod, Reference, Transaction};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kambe_store::{JsonStoreExt, KeyValueStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New entry written at the head
    Inserted,
    /// Reference already present; nothing written
    AlreadyRecorded,
}

/// Durable transaction ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    durable: Arc<dyn KeyValueStore>,
}

impl Ledger {
    /// Create ledger over `durable`
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self { durable }
    }

    fn load(&self) -> Vec<Transaction> {
        self.durable.read_json_or(keys::TRANSACTIONS, Vec::new())
    }

    /// Stored ledger for a rewrite; fails instead of treating an undecodable
    /// ledger as empty
    fn load_for_update(&self) -> Result<Vec<Transaction>, PaywallError> {
        Ok(self
            .durable
            .read_json(keys::TRANSACTIONS)?
            .unwrap_or_default())
    }

    /// Insert `tx` at the head unless its reference is already recorded
    ///
    /// # Errors
    /// Returns `PaywallError::Store` when the stored ledger cannot be decoded
    /// or the write is rejected; the stored ledger is left unchanged in both
    /// cases
    pub fn append(&self, tx: Transaction) -> Result<AppendOutcome, PaywallError> {
        let mut all = self.load_for_update()?;
        if all.iter().any(|existing| existing.id == tx.id) {
            tracing::debug!(reference = %tx.id, "transaction already recorded");
            return Ok(AppendOutcome::AlreadyRecorded);
        }

        let reference = tx.id.clone();
        let amount = tx.amount;
        all.insert(0, tx);
        self.durable.write_json(keys::TRANSACTIONS, &all)?;

        tracing::debug!(reference = %reference, amount, entries = all.len(), "transaction appended");
        Ok(AppendOutcome::Inserted)
    }

    /// Check if `reference` is recorded
    #[must_use]
    pub fn contains(&self, reference: &Reference) -> bool {
        self.load().iter().any(|tx| &tx.id == reference)
    }

    /// Look up one transaction
    #[must_use]
    pub fn get(&self, reference: &Reference) -> Option<Transaction> {
        self.load().into_iter().find(|tx| &tx.id == reference)
    }

    /// Every transaction, most recent first
    #[must_use]
    pub fn list_all(&self) -> Vec<Transaction> {
        self.load()
    }

    /// The `n` most recent transactions
    #[must_use]
    pub fn list_recent(&self, n: usize) -> Vec<Transaction> {
        let mut all = self.load();
        all.truncate(n);
        all
    }

    /// Transactions paid through `method`, most recent first
    #[must_use]
    pub fn list_by_method(&self, method: PaymentMethod) -> Vec<Transaction> {
        self.load()
            .into_iter()
            .filter(|tx| tx.method == method)
            .collect()
    }

    /// Number of recorded transactions
    #[must_use]
    pub fn len(&self) -> usize {
        self.load().len()
    }

    /// Check if the ledger is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Sum of amounts recorded at or after `since`
    #[must_use]
    pub fn aggregate(&self, since: DateTime<Utc>) -> Amount {
        sum_since(&self.load(), since)
    }

    /// Sum of every recorded amount
    #[must_use]
    pub fn total(&self) -> Amount {
        self.load()
            .iter()
            .fold(0, |acc: Amount, tx| acc.saturating_add(tx.amount))
    }

    /// Transaction count per method, in first-seen order
    #[must_use]
    pub fn breakdown_by_method(&self) -> IndexMap<PaymentMethod, usize> {
        count_by_method(&self.load())
    }

    /// Remove every transaction
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn clear(&self) -> Result<(), PaywallError> {
        self.durable.write_json(keys::TRANSACTIONS, &Vec::<Transaction>::new())?;
        tracing::warn!("ledger cleared");
        Ok(())
    }

    /// Replace the ledger with `transactions`, keeping the first entry of
    /// each reference
    ///
    /// Returns the number of entries kept.
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn import(&self, transactions: Vec<Transaction>) -> Result<usize, PaywallError> {
        let mut seen = HashSet::new();
        let deduped: Vec<Transaction> = transactions
            .into_iter()
            .filter(|tx| seen.insert(tx.id.clone()))
            .collect();
        self.durable.write_json(keys::TRANSACTIONS, &deduped)?;
        tracing::info!(entries = deduped.len(), "ledger imported");
        Ok(deduped.len())
    }

    /// Copy of the full ledger
    #[must_use]
    pub fn export(&self) -> Vec<Transaction> {
        self.load()
    }
}

/// Sum of amounts in `transactions` recorded at or after `since`
#[must_use]
pub fn sum_since(transactions: &[Transaction], since: DateTime<Utc>) -> Amount {
    transactions
        .iter()
        .filter(|tx| tx.timestamp >= since)
        .fold(0, |acc: Amount, tx| acc.saturating_add(tx.amount))
}

/// Count per method, keyed in first-seen order
#[must_use]
pub fn count_by_method(transactions: &[Transaction]) -> IndexMap<PaymentMethod, usize> {
    let mut counts = IndexMap::new();
    for tx in transactions {
        *counts.entry(tx.method).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kambe_store::MemoryStore;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_714_557_600 + secs, 0).unwrap()
    }

    fn tx(id: &str, amount: Amount, method: PaymentMethod, secs: i64) -> Transaction {
        Transaction::success(Reference::new(id), amount, method, "90000000", at(secs))
    }

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn append_is_idempotent_per_reference() {
        let ledger = ledger();
        assert_eq!(
            ledger.append(tx("r1", 200, PaymentMethod::Mynita, 0)).unwrap(),
            AppendOutcome::Inserted
        );
        assert_eq!(
            ledger.append(tx("r1", 999, PaymentMethod::Cash, 5)).unwrap(),
            AppendOutcome::AlreadyRecorded
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&Reference::new("r1")).unwrap().amount, 200);
    }

    #[test]
    fn newest_first() {
        let ledger = ledger();
        ledger.append(tx("r1", 200, PaymentMethod::Mynita, 0)).unwrap();
        ledger.append(tx("r2", 200, PaymentMethod::Mynita, 10)).unwrap();
        ledger.append(tx("r3", 200, PaymentMethod::Mynita, 20)).unwrap();

        let ids: Vec<String> = ledger.list_recent(2).iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["r3", "r2"]);
    }

    #[test]
    fn empty_ledger_aggregates_to_zero() {
        let ledger = ledger();
        assert_eq!(ledger.aggregate(at(0)), 0);
        assert_eq!(ledger.total(), 0);
        assert!(ledger.breakdown_by_method().is_empty());
    }

    #[test]
    fn quota_failure_leaves_ledger_unchanged() {
        let ledger = Ledger::new(Arc::new(MemoryStore::with_quota(300)));
        ledger.append(tx("r1", 200, PaymentMethod::Mynita, 0)).unwrap();

        let big = tx("r2", 200, PaymentMethod::Mynita, 1).with_details(Some("x".repeat(400)));
        let err = ledger.append(big).unwrap_err();
        assert!(err.is_storage_fault());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn filter_and_import() {
        let ledger = ledger();
        let imported = ledger
            .import(vec![
                tx("a", 200, PaymentMethod::Mynita, 0),
                tx("b", 500, PaymentMethod::Cash, 0),
                tx("a", 700, PaymentMethod::Amanata, 0),
            ])
            .unwrap();
        assert_eq!(imported, 2);
        assert_eq!(ledger.list_by_method(PaymentMethod::Cash).len(), 1);
        assert_eq!(ledger.get(&Reference::new("a")).unwrap().amount, 200);

        ledger.clear().unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn undecodable_ledger_is_never_overwritten() {
        let store = Arc::new(MemoryStore::new());
        let mut entry = serde_json::to_value(tx("old", 200, PaymentMethod::Mynita, 0)).unwrap();
        entry["method"] = serde_json::json!("Orange");
        let raw = serde_json::to_string(&vec![entry]).unwrap();
        store.set(keys::TRANSACTIONS, raw.clone()).unwrap();

        let ledger = Ledger::new(store.clone());
        assert!(ledger.is_empty());

        let err = ledger.append(tx("new", 200, PaymentMethod::Mynita, 1)).unwrap_err();
        assert!(err.is_storage_fault());
        assert!(!err.is_retryable());
        assert_eq!(store.get(keys::TRANSACTIONS).unwrap(), Some(raw));
    }

    proptest! {
        #[test]
        fn aggregate_matches_manual_sum(
            entries in prop::collection::vec((1u64..50_000, 0i64..86_400), 0..30),
            cut in 0i64..86_400,
        ) {
            let ledger = ledger();
            for (i, (amount, secs)) in entries.iter().enumerate() {
                ledger.append(tx(&format!("r{i}"), *amount, PaymentMethod::Mynita, *secs)).unwrap();
            }
            let expected: u64 = entries.iter().filter(|(_, s)| *s >= cut).map(|(a, _)| a).sum();
            prop_assert_eq!(ledger.aggregate(at(cut)), expected);
            prop_assert_eq!(ledger.aggregate(at(0) - Duration::seconds(1)), ledger.total());
        }
    }
}
