//! Testing utilities for the Kambegoye workspace
//!
//! Shared fixtures: a paywall harness over in-memory stores with a manual
//! clock and seeded identifiers, second-tab contexts, sample data.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use kambe_paywall::{
    AdminNotifier, Amount, Clock, ManualClock, PaymentMethod, Paywall, PaywallConfig, Reference,
    SeededIds, SimulatedGateway, Stores, Transaction, Worker,
};
use kambe_store::{KeyValueStore, MemoryStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed starting instant: 2024-05-15 10:00:00 UTC
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_715_767_200, 0).unwrap()
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.messages().into_iter().map(|(s, _)| s).collect()
    }
}

impl AdminNotifier for RecordingNotifier {
    fn notify(&self, subject: &str, message: &str) {
        self.messages
            .lock()
            .push((subject.to_string(), message.to_string()));
    }
}

/// One browsing context: its own ephemeral store, gateway and paywall
#[derive(Debug, Clone)]
pub struct Tab {
    pub stores: Stores,
    pub gateway: Arc<SimulatedGateway>,
    pub paywall: Paywall,
}

/// Paywall wired to in-memory stores, a manual clock and seeded ids
#[derive(Debug, Clone)]
pub struct Harness {
    pub config: PaywallConfig,
    pub durable: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub tab: Tab,
    seed: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PaywallConfig::default())
    }

    /// Harness with seeded defaults
    pub fn with_config(config: PaywallConfig) -> Self {
        let harness = Self::with_durable(config, Arc::new(MemoryStore::new()));
        harness.paywall().ensure_seeded().unwrap();
        harness
    }

    /// Unseeded harness over a caller-supplied durable store (e.g. quota-limited)
    pub fn with_durable(config: PaywallConfig, durable: Arc<MemoryStore>) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let notifier = Arc::new(RecordingNotifier::default());
        let tab = build_tab(
            &config,
            &durable,
            &clock,
            &notifier,
            1,
            Arc::new(MemoryStore::new()),
        );
        Self {
            config,
            durable,
            clock,
            notifier,
            tab,
            seed: 1,
        }
    }

    /// A fresh browsing context sharing only the durable store
    pub fn open_tab(&mut self) -> Tab {
        self.open_tab_with(Arc::new(MemoryStore::new()))
    }

    /// A browsing context over the given ephemeral store
    pub fn open_tab_with(&mut self, ephemeral: Arc<dyn KeyValueStore>) -> Tab {
        self.seed += 1;
        build_tab(
            &self.config,
            &self.durable,
            &self.clock,
            &self.notifier,
            self.seed,
            ephemeral,
        )
    }

    pub fn paywall(&self) -> &Paywall {
        &self.tab.paywall
    }

    pub fn gateway(&self) -> &SimulatedGateway {
        &self.tab.gateway
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

fn build_tab(
    config: &PaywallConfig,
    durable: &Arc<MemoryStore>,
    clock: &Arc<ManualClock>,
    notifier: &Arc<RecordingNotifier>,
    seed: u64,
    ephemeral: Arc<dyn KeyValueStore>,
) -> Tab {
    let durable: Arc<dyn KeyValueStore> = durable.clone();
    let clock: Arc<dyn Clock> = clock.clone();
    let stores = Stores::new(durable, ephemeral);
    let gateway = Arc::new(SimulatedGateway::new(
        Arc::clone(&stores.ephemeral),
        Arc::new(SeededIds::new(seed)),
        Arc::clone(&clock),
        config.base_url.clone(),
    ));
    let paywall = Paywall::new(config.clone(), stores.clone(), gateway.clone(), clock)
        .with_notifier(notifier.clone());
    Tab {
        stores,
        gateway,
        paywall,
    }
}

/// Confirmed transaction at `at`
pub fn sample_transaction(
    id: &str,
    amount: Amount,
    method: PaymentMethod,
    at: DateTime<Utc>,
) -> Transaction {
    Transaction::success(Reference::new(id), amount, method, "90000000", at)
}

/// Three transactions dated `at`: two consultations and a shop sale
pub fn sample_day(at: DateTime<Utc>) -> Vec<Transaction> {
    vec![
        sample_transaction("tx-shop", 15_000, PaymentMethod::Amanata, at),
        sample_transaction("tx-2", 200, PaymentMethod::Mynita, at),
        sample_transaction("tx-1", 200, PaymentMethod::Mynita, at),
    ]
}

/// Active worker with contact numbers
pub fn sample_worker(id: &str) -> Worker {
    Worker::new(id, "Issa", "Harouna", "1")
        .with_neighborhood("3")
        .with_contact("96000000", "22796000000")
}
