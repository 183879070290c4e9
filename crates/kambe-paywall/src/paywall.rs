//! Session reconciler
//!
//! [`Paywall`] ties the gateway, the ledger and the session tracker
//! together. A visitor starts `Locked`; finalizing a confirmed payment at
//! the consultation price records it and opens a time-bounded session.
//! Payments at any other amount are recorded without unlocking.
//!
//! Finalization never fails outright. Declines, unknown references and
//! storage faults all come back as a [`FinalizeOutcome`].

use crate::clock::Clock;
use crate::config::PaywallConfig;
use crate::directory::{default_workers, AccountStatus, Directory, WorkerCard, WorkerFilter};
use crate::error::PaywallError;
use crate::gateway::{GatewayStatus, Initiation, PaymentGateway, PaymentRequest};
use crate::ledger::{AppendOutcome, Ledger};
use crate::notify::{AdminNotifier, LogNotifier};
use crate::pending::PendingPayments;
use crate::redirect::CallbackQuery;
use crate::report::RevenueReport;
use crate::session::{SessionState, SessionTracker};
use crate::settings::{AdminAuth, Settings};
use crate::snapshot::DataSnapshot;
use crate::types::{Amount, PaymentMethod, Reference, Transaction};
use kambe_store::{KeyValueStore, MemoryStore};
use std::sync::Arc;

/// The two storage areas a paywall works over
///
/// `durable` is shared by every browsing context; `ephemeral` belongs to one.
#[derive(Debug, Clone)]
pub struct Stores {
    pub durable: Arc<dyn KeyValueStore>,
    pub ephemeral: Arc<dyn KeyValueStore>,
}

impl Stores {
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Fresh unbounded in-memory stores
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }
}

/// Payment parameters supplied from outside the current browsing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOverride {
    pub amount: Amount,
    pub method: PaymentMethod,
    pub phone: String,
    pub details: Option<String>,
    /// Treat the payment as confirmed regardless of gateway status
    pub completed: bool,
}

impl PaymentOverride {
    #[must_use]
    pub fn new(amount: Amount, method: PaymentMethod, phone: impl Into<String>) -> Self {
        Self {
            amount,
            method,
            phone: phone.into(),
            details: None,
            completed: false,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Override carried by a callback URL
    ///
    /// Requires amount and phone. An unknown or missing method label falls
    /// back to `fallback`. Callback parameters only exist after a
    /// confirmation, so the override is marked completed.
    #[must_use]
    pub fn from_callback(query: &CallbackQuery, fallback: PaymentMethod) -> Option<Self> {
        let amount = query.amount?;
        let phone = query.phone.clone()?;
        let method = match query.method.as_deref().map(str::parse::<PaymentMethod>) {
            Some(Ok(method)) => method,
            Some(Err(e)) => {
                tracing::warn!(
                    reference = %query.reference,
                    error = %e,
                    fallback = %fallback,
                    "unknown method in callback"
                );
                fallback
            }
            None => fallback,
        };
        Some(Self {
            amount,
            method,
            phone,
            details: query.details.clone(),
            completed: true,
        })
    }
}

/// Result of a finalization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Recorded and a session was opened
    Unlocked(Transaction),
    /// Recorded; amount differs from the consultation price so no session
    Recorded(Transaction),
    /// Reference was already in the ledger; nothing changed
    AlreadyRecorded,
    /// Gateway has not confirmed the payment
    NotConfirmed(GatewayStatus),
    /// Confirmed but the ledger write failed
    NotRecorded,
}

impl FinalizeOutcome {
    /// Check if the payment is (now) in the ledger
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Unlocked(_) | Self::Recorded(_) | Self::AlreadyRecorded
        )
    }

    /// Check if this call opened a session
    #[inline]
    #[must_use]
    pub fn unlocked(&self) -> bool {
        matches!(self, Self::Unlocked(_))
    }
}

/// Details annotation for payments recorded on an override alone
const UNCONFIRMED_NOTE: &str = "not confirmed by gateway";

/// Values a finalization resolved to
struct Resolved {
    amount: Amount,
    method: PaymentMethod,
    phone: String,
    details: Option<String>,
    expected_price: Amount,
}

/// Paywall state machine and admin facade
#[derive(Debug, Clone)]
pub struct Paywall {
    config: PaywallConfig,
    stores: Stores,
    settings: Settings,
    admin: AdminAuth,
    ledger: Ledger,
    pending: PendingPayments,
    session: SessionTracker,
    directory: Directory,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn AdminNotifier>,
}

impl Paywall {
    /// Create paywall over `stores`
    pub fn new(
        config: PaywallConfig,
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let durable = Arc::clone(&stores.durable);
        let ephemeral = Arc::clone(&stores.ephemeral);
        Self {
            settings: Settings::new(Arc::clone(&durable), config.default_consultation_price),
            admin: AdminAuth::new(Arc::clone(&durable)),
            ledger: Ledger::new(Arc::clone(&durable)),
            directory: Directory::new(durable),
            pending: PendingPayments::new(Arc::clone(&ephemeral)),
            session: SessionTracker::new(ephemeral, config.session_duration()),
            notifier: Arc::new(LogNotifier::new(config.admin_contact.clone())),
            config,
            stores,
            gateway,
            clock,
        }
    }

    /// With notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn AdminNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PaywallConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn admin(&self) -> &AdminAuth {
        &self.admin
    }

    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    #[inline]
    #[must_use]
    pub fn pending(&self) -> &PendingPayments {
        &self.pending
    }

    /// Write default settings, credentials and workers where absent
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn ensure_seeded(&self) -> Result<(), PaywallError> {
        self.settings.seed()?;
        self.admin.seed()?;
        self.directory.seed_defaults(&default_workers())?;
        Ok(())
    }

    /// Start paying for consultation access at the current price
    ///
    /// # Errors
    /// See [`Paywall::initiate`]
    pub async fn initiate_consultation(
        &self,
        method: PaymentMethod,
        phone: &str,
    ) -> Result<Initiation, PaywallError> {
        let price = self.settings.consultation_price();
        self.initiate(price, method, phone, None).await
    }

    /// Start a payment; the session state does not change
    ///
    /// # Errors
    /// - `PaywallError::InvalidRequest` for a zero amount or blank phone
    /// - gateway and storage errors from initiation
    pub async fn initiate(
        &self,
        amount: Amount,
        method: PaymentMethod,
        phone: &str,
        details: Option<String>,
    ) -> Result<Initiation, PaywallError> {
        if amount == 0 {
            return Err(PaywallError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(PaywallError::InvalidRequest(
                "phone number is required".to_string(),
            ));
        }

        self.gateway
            .initiate(PaymentRequest {
                amount,
                method,
                phone: phone.to_string(),
                details,
                expected_price: Some(self.settings.consultation_price()),
            })
            .await
    }

    /// Reconcile `reference` with the gateway and record it if confirmed
    ///
    /// Safe to call repeatedly.
    pub async fn finalize(
        &self,
        reference: &Reference,
        payment_override: Option<PaymentOverride>,
    ) -> FinalizeOutcome {
        self.finalize_annotated(reference, payment_override, None)
            .await
    }

    /// Finalize from a callback URL query
    pub async fn finalize_callback(&self, query: &CallbackQuery) -> FinalizeOutcome {
        let payment_override = PaymentOverride::from_callback(query, self.config.fallback_method);
        self.finalize(&query.reference, payment_override).await
    }

    async fn finalize_annotated(
        &self,
        reference: &Reference,
        payment_override: Option<PaymentOverride>,
        annotation: Option<String>,
    ) -> FinalizeOutcome {
        let status = match self.gateway.check_status(reference).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "gateway status unavailable");
                GatewayStatus::Pending
            }
        };

        let forced = payment_override.as_ref().is_some_and(|o| o.completed);
        if status != GatewayStatus::Success && !forced {
            tracing::info!(reference = %reference, ?status, "payment not confirmed");
            return FinalizeOutcome::NotConfirmed(status);
        }

        if self.ledger.contains(reference) {
            tracing::debug!(reference = %reference, "payment already finalized");
            return FinalizeOutcome::AlreadyRecorded;
        }

        let annotation = if status == GatewayStatus::Success {
            annotation
        } else {
            tracing::warn!(
                reference = %reference,
                ?status,
                "finalizing on a completed override without gateway confirmation"
            );
            annotation.or_else(|| Some(UNCONFIRMED_NOTE.to_string()))
        };

        let resolved = self.resolve(reference, payment_override);
        let details = match (resolved.details, annotation) {
            (Some(d), Some(a)) => Some(format!("{d} ({a})")),
            (d, a) => d.or(a),
        };
        let now = self.clock.now();
        let tx = Transaction::success(
            reference.clone(),
            resolved.amount,
            resolved.method,
            resolved.phone,
            now,
        )
        .with_details(details);

        match self.ledger.append(tx.clone()) {
            Ok(AppendOutcome::Inserted) => {}
            Ok(AppendOutcome::AlreadyRecorded) => return FinalizeOutcome::AlreadyRecorded,
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "payment confirmed but not recorded");
                return FinalizeOutcome::NotRecorded;
            }
        }

        if let Err(e) = self.pending.remove(reference) {
            tracing::warn!(reference = %reference, error = %e, "failed to drop pending context");
        }

        self.notifier.notify(
            "New payment",
            &format!(
                "Received {} {} via {} from {}. Ref: {}",
                tx.amount, self.config.currency, tx.method, tx.client_phone, tx.id
            ),
        );

        if tx.amount != resolved.expected_price {
            tracing::info!(
                reference = %reference,
                amount = tx.amount,
                expected = resolved.expected_price,
                "payment recorded without unlocking"
            );
            return FinalizeOutcome::Recorded(tx);
        }

        match self.session.start(now) {
            Ok(()) => {
                tracing::info!(reference = %reference, amount = tx.amount, method = %tx.method, "payment finalized");
                FinalizeOutcome::Unlocked(tx)
            }
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "payment recorded but session not started");
                FinalizeOutcome::Recorded(tx)
            }
        }
    }

    fn resolve(&self, reference: &Reference, payment_override: Option<PaymentOverride>) -> Resolved {
        let live_price = self.settings.consultation_price();

        if let Some(ctx) = self.pending.get(reference) {
            return Resolved {
                amount: ctx.amount,
                method: ctx.method,
                phone: ctx.phone,
                details: ctx.details,
                expected_price: ctx.expected_price.unwrap_or(live_price),
            };
        }

        if let Some(o) = payment_override {
            return Resolved {
                amount: o.amount,
                method: o.method,
                phone: o.phone,
                details: o.details,
                expected_price: live_price,
            };
        }

        tracing::warn!(
            reference = %reference,
            amount = live_price,
            method = %self.config.fallback_method,
            "no pending context or override, finalizing with defaults"
        );
        Resolved {
            amount: live_price,
            method: self.config.fallback_method,
            phone: String::new(),
            details: None,
            expected_price: live_price,
        }
    }

    /// User asserts they paid; alerts the admin and retries recognition
    pub async fn declare_paid(&self, reference: &Reference, phone: &str) -> FinalizeOutcome {
        self.notifier.notify(
            "Payment declared",
            &format!("Client {phone} declares a payment that was not confirmed. Ref: {reference}"),
        );
        tracing::info!(reference = %reference, "payment declared by client");
        self.finalize(reference, None).await
    }

    /// Admin records `reference` as paid and finalizes it with `payment_override`
    pub async fn force_validate(
        &self,
        reference: &Reference,
        payment_override: PaymentOverride,
        actor: &str,
    ) -> FinalizeOutcome {
        tracing::warn!(
            reference = %reference,
            actor,
            amount = payment_override.amount,
            "payment force-validated"
        );
        if let Err(e) = self
            .gateway
            .record_decision(reference, GatewayStatus::Success)
            .await
        {
            tracing::warn!(reference = %reference, error = %e, "could not record manual decision");
        }
        self.finalize_annotated(
            reference,
            Some(payment_override.completed()),
            Some(format!("validated by {actor}")),
        )
        .await
    }

    /// Session state right now
    pub fn state(&self) -> SessionState {
        self.session.state(self.clock.now())
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().is_unlocked()
    }

    /// Whole seconds left in the session, zero when locked
    pub fn remaining_secs(&self) -> u64 {
        self.state().remaining_secs()
    }

    /// Drop the session immediately
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn end_session(&self) -> Result<(), PaywallError> {
        self.session.end()
    }

    /// Active worker `id` with contacts shown only while unlocked
    ///
    /// An unlocked read counts as a profile view.
    pub fn worker_card(&self, id: &str) -> Option<WorkerCard> {
        let worker = self
            .directory
            .get_by_id(id)
            .filter(|w| w.account_status == AccountStatus::Active)?;
        let unlocked = self.is_unlocked();
        if unlocked {
            if let Err(e) = self.directory.increment_view_count(id) {
                tracing::warn!(worker = id, error = %e, "failed to count profile view");
            }
        }
        Some(WorkerCard::from_worker(&worker, unlocked))
    }

    /// Search results as cards
    pub fn search(&self, filter: &WorkerFilter) -> Vec<WorkerCard> {
        let unlocked = self.is_unlocked();
        self.directory
            .query_workers(filter)
            .iter()
            .map(|w| WorkerCard::from_worker(w, unlocked))
            .collect()
    }

    /// Dashboard statistics at the current instant
    pub fn revenue_report(&self) -> RevenueReport {
        RevenueReport::build(&self.ledger, &self.directory, self.clock.now())
    }

    /// Snapshot of workers, transactions and settings
    pub fn export_snapshot(&self) -> DataSnapshot {
        DataSnapshot {
            workers: Some(self.directory.list_all()),
            transactions: Some(self.ledger.export()),
            settings: Some(self.settings.get()),
        }
    }

    /// Restore the sections present in `snapshot`
    ///
    /// Settings go first so an invalid price rejects the whole import.
    ///
    /// # Errors
    /// Rejects a zero consultation price; propagates storage faults, and
    /// sections written before a fault stay
    pub fn import_snapshot(&self, snapshot: DataSnapshot) -> Result<(), PaywallError> {
        if let Some(settings) = snapshot.settings {
            self.settings.replace(&settings)?;
        }
        if let Some(workers) = snapshot.workers {
            self.directory.replace_all(&workers)?;
        }
        if let Some(transactions) = snapshot.transactions {
            self.ledger.import(transactions)?;
        }
        tracing::info!("data snapshot imported");
        Ok(())
    }

    /// Wipe durable data and re-seed defaults
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn factory_reset(&self) -> Result<(), PaywallError> {
        self.stores.durable.clear()?;
        tracing::warn!("durable data wiped");
        self.ensure_seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::MockPaymentGateway;
    use chrono::DateTime;

    fn paywall_with(gateway: MockPaymentGateway) -> Paywall {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_715_767_200, 0).unwrap(),
        ));
        Paywall::new(
            PaywallConfig::default(),
            Stores::in_memory(),
            Arc::new(gateway),
            clock,
        )
    }

    #[tokio::test]
    async fn declined_payment_is_retriable_without_side_effects() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .times(2)
            .returning(|_| Ok(GatewayStatus::Failed));
        let paywall = paywall_with(gateway);
        let reference = Reference::new("r1");

        for _ in 0..2 {
            assert_eq!(
                paywall.finalize(&reference, None).await,
                FinalizeOutcome::NotConfirmed(GatewayStatus::Failed)
            );
        }
        assert!(paywall.ledger().is_empty());
        assert!(!paywall.is_unlocked());
    }

    #[tokio::test]
    async fn gateway_error_reads_as_pending() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .returning(|_| Err(PaywallError::Gateway("timeout".to_string())));
        let paywall = paywall_with(gateway);

        let outcome = paywall.finalize(&Reference::new("r1"), None).await;
        assert_eq!(outcome, FinalizeOutcome::NotConfirmed(GatewayStatus::Pending));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn completed_override_bypasses_pending_status() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .returning(|_| Ok(GatewayStatus::Pending));
        let paywall = paywall_with(gateway);

        let payment = PaymentOverride::new(200, PaymentMethod::Amanata, "91000000").completed();
        let outcome = paywall.finalize(&Reference::new("r2"), Some(payment)).await;

        let FinalizeOutcome::Unlocked(tx) = outcome else {
            panic!("expected unlock, got {outcome:?}");
        };
        assert_eq!(tx.method, PaymentMethod::Amanata);
        assert_eq!(tx.client_phone, "91000000");
        assert_eq!(tx.details.as_deref(), Some("not confirmed by gateway"));
        assert!(paywall.is_unlocked());
    }

    #[tokio::test]
    async fn handmade_callback_is_annotated() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .returning(|_| Ok(GatewayStatus::Pending));
        let paywall = paywall_with(gateway);

        let query = crate::redirect::parse_callback(
            "/payment/callback?ref=X&amount=200&phone=1&method=Mynita&details=Consultation",
        )
        .unwrap();
        let outcome = paywall.finalize_callback(&query).await;

        assert!(outcome.unlocked());
        let tx = paywall.ledger().get(&Reference::new("X")).unwrap();
        assert_eq!(
            tx.details.as_deref(),
            Some("Consultation (not confirmed by gateway)")
        );
    }

    #[tokio::test]
    async fn confirmed_payment_is_not_annotated() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .returning(|_| Ok(GatewayStatus::Success));
        let paywall = paywall_with(gateway);

        let payment = PaymentOverride::new(200, PaymentMethod::Mynita, "90000000").completed();
        let outcome = paywall.finalize(&Reference::new("r6"), Some(payment)).await;

        let FinalizeOutcome::Unlocked(tx) = outcome else {
            panic!("expected unlock, got {outcome:?}");
        };
        assert_eq!(tx.details, None);
    }

    #[tokio::test]
    async fn uncompleted_override_needs_gateway_confirmation() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_check_status()
            .returning(|_| Ok(GatewayStatus::Pending));
        let paywall = paywall_with(gateway);

        let payment = PaymentOverride::new(200, PaymentMethod::Mynita, "90000000");
        let outcome = paywall.finalize(&Reference::new("r3"), Some(payment)).await;
        assert_eq!(outcome, FinalizeOutcome::NotConfirmed(GatewayStatus::Pending));
    }

    #[tokio::test]
    async fn force_validate_records_decision_and_annotates() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_record_decision()
            .withf(|reference, status| {
                reference.as_str() == "r9" && *status == GatewayStatus::Success
            })
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_check_status()
            .returning(|_| Ok(GatewayStatus::Pending));
        let paywall = paywall_with(gateway);

        let payment = PaymentOverride::new(200, PaymentMethod::Cash, "92000000")
            .with_details("paid at the office");
        let outcome = paywall
            .force_validate(&Reference::new("r9"), payment, "admin")
            .await;

        assert!(outcome.unlocked());
        let tx = paywall.ledger().get(&Reference::new("r9")).unwrap();
        assert_eq!(
            tx.details.as_deref(),
            Some("paid at the office (validated by admin)")
        );
    }

    #[tokio::test]
    async fn initiate_rejects_bad_requests_before_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_initiate().never();
        let paywall = paywall_with(gateway);

        let err = paywall
            .initiate(200, PaymentMethod::Mynita, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaywallError::InvalidRequest(_)));

        let err = paywall
            .initiate(0, PaymentMethod::Mynita, "90000000", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaywallError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn initiate_snapshots_current_price() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_initiate()
            .withf(|request| request.expected_price == Some(200) && request.amount == 15_000)
            .times(1)
            .returning(|_| {
                Ok(Initiation {
                    reference: Reference::new("r4"),
                    redirect_target: "/payment/simulation?ref=r4".to_string(),
                })
            });
        let paywall = paywall_with(gateway);

        let init = paywall
            .initiate(15_000, PaymentMethod::Amanata, "90000000", Some("cart".to_string()))
            .await
            .unwrap();
        assert_eq!(init.reference, Reference::new("r4"));
    }

    #[test]
    fn callback_override_falls_back_on_unknown_method() {
        let query = CallbackQuery {
            reference: Reference::new("r5"),
            amount: Some(200),
            phone: Some("90000000".to_string()),
            method: Some("Orange".to_string()),
            details: None,
        };
        let payment = PaymentOverride::from_callback(&query, PaymentMethod::Mynita).unwrap();
        assert_eq!(payment.method, PaymentMethod::Mynita);
        assert!(payment.completed);

        let bare = CallbackQuery {
            amount: None,
            ..query
        };
        assert!(PaymentOverride::from_callback(&bare, PaymentMethod::Mynita).is_none());
    }
}
