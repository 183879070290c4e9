//! Payment gateway boundary and the in-app simulator
//!
//! [`PaymentGateway`] is the seam where a real processor would plug in.
//! [`SimulatedGateway`] stands in for one: it issues a redirect to the
//! simulation page and records the user's confirm/cancel decision in the
//! ephemeral store, where `check_status` later reads it.

use crate::clock::Clock;
use crate::error::PaywallError;
use crate::ids::IdGenerator;
use crate::keys;
use crate::pending::{PendingPayment, PendingPayments};
use crate::redirect::{self, CallbackQuery, SimulationQuery};
use crate::types::{Amount, PaymentMethod, Reference};
use async_trait::async_trait;
use kambe_store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Status reported by the gateway for a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    /// No decision yet
    Pending,
    /// Paid
    Success,
    /// Declined or cancelled
    Failed,
}

impl GatewayStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What the payer asked to pay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Amount,
    pub method: PaymentMethod,
    pub phone: String,
    pub details: Option<String>,
    /// Consultation price at initiation, kept with the pending context
    pub expected_price: Option<Amount>,
}

/// Result of initiating a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiation {
    pub reference: Reference,
    /// Where to send the payer next
    pub redirect_target: String,
}

/// External payment processor boundary
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Start a payment: allocate a reference, store the pending context and
    /// produce the redirect target
    async fn initiate(&self, request: PaymentRequest) -> Result<Initiation, PaywallError>;

    /// Current status of `reference`; unknown references are pending
    async fn check_status(&self, reference: &Reference) -> Result<GatewayStatus, PaywallError>;

    /// Record a decision for `reference` out of band (manual reconciliation)
    async fn record_decision(
        &self,
        reference: &Reference,
        status: GatewayStatus,
    ) -> Result<(), PaywallError>;
}

/// In-app gateway simulator
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    ephemeral: Arc<dyn KeyValueStore>,
    pending: PendingPayments,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl SimulatedGateway {
    /// Create simulator writing contexts and decisions to `ephemeral`
    pub fn new(
        ephemeral: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            pending: PendingPayments::new(Arc::clone(&ephemeral)),
            ephemeral,
            ids,
            clock,
            base_url: base_url.into(),
        }
    }

    /// Pending contexts written by this simulator
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &PendingPayments {
        &self.pending
    }

    /// Store a decision for `reference`
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn decide(&self, reference: &Reference, status: GatewayStatus) -> Result<(), PaywallError> {
        self.ephemeral
            .set(&keys::decision(reference), status.as_str().to_string())?;
        tracing::debug!(reference = %reference, status = status.as_str(), "gateway decision recorded");
        Ok(())
    }

    /// Read the decision for `reference`
    ///
    /// Missing or unreadable decisions are pending.
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn status(&self, reference: &Reference) -> Result<GatewayStatus, PaywallError> {
        let raw = self.ephemeral.get(&keys::decision(reference))?;
        Ok(raw
            .as_deref()
            .and_then(GatewayStatus::parse)
            .unwrap_or(GatewayStatus::Pending))
    }

    /// User pressed confirm on the simulation page
    ///
    /// Returns the callback target carrying the payment parameters.
    ///
    /// # Errors
    /// Propagates storage faults and encoding errors
    pub fn confirm(&self, query: &SimulationQuery) -> Result<String, PaywallError> {
        self.decide(&query.reference, GatewayStatus::Success)?;
        tracing::info!(reference = %query.reference, amount = query.amount, "simulated payment confirmed");
        redirect::callback_target(&self.base_url, &CallbackQuery::from(query))
    }

    /// User pressed cancel on the simulation page
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn cancel(&self, reference: &Reference) -> Result<String, PaywallError> {
        self.decide(reference, GatewayStatus::Failed)?;
        tracing::info!(reference = %reference, "simulated payment cancelled");
        Ok(redirect::cancel_target(&self.base_url))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initiate(&self, request: PaymentRequest) -> Result<Initiation, PaywallError> {
        let reference = Reference::new(self.ids.next_id());

        self.pending.put(&PendingPayment {
            reference: reference.clone(),
            amount: request.amount,
            method: request.method,
            phone: request.phone.clone(),
            details: request.details.clone(),
            expected_price: request.expected_price,
            created_at: self.clock.now(),
        })?;

        let redirect_target = redirect::simulation_target(
            &self.base_url,
            &SimulationQuery {
                reference: reference.clone(),
                amount: request.amount,
                method: request.method.label().to_string(),
                phone: request.phone,
                details: request.details,
            },
        )?;

        tracing::info!(
            reference = %reference,
            amount = request.amount,
            method = %request.method,
            "payment initiated"
        );

        Ok(Initiation {
            reference,
            redirect_target,
        })
    }

    async fn check_status(&self, reference: &Reference) -> Result<GatewayStatus, PaywallError> {
        self.status(reference)
    }

    async fn record_decision(
        &self,
        reference: &Reference,
        status: GatewayStatus,
    ) -> Result<(), PaywallError> {
        self.decide(reference, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ids::SeededIds;
    use kambe_store::MemoryStore;

    fn gateway() -> SimulatedGateway {
        SimulatedGateway::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SeededIds::new(1)),
            Arc::new(SystemClock),
            "",
        )
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: 200,
            method: PaymentMethod::Mynita,
            phone: "90000000".to_string(),
            details: None,
            expected_price: Some(200),
        }
    }

    #[tokio::test]
    async fn initiate_stores_context_and_embeds_params() {
        let gw = gateway();
        let init = gw.initiate(request()).await.unwrap();

        let query = redirect::parse_simulation(&init.redirect_target).unwrap();
        assert_eq!(query.reference, init.reference);
        assert_eq!(query.amount, 200);
        assert_eq!(query.method, "Mynita");
        assert_eq!(query.phone, "90000000");

        let ctx = gw.pending().get(&init.reference).unwrap();
        assert_eq!(ctx.expected_price, Some(200));
    }

    #[tokio::test]
    async fn undecided_reference_is_pending() {
        let gw = gateway();
        let init = gw.initiate(request()).await.unwrap();
        assert_eq!(gw.check_status(&init.reference).await.unwrap(), GatewayStatus::Pending);
        assert_eq!(
            gw.check_status(&Reference::new("nope")).await.unwrap(),
            GatewayStatus::Pending
        );
    }

    #[tokio::test]
    async fn confirm_and_cancel_record_decisions() {
        let gw = gateway();
        let init = gw.initiate(request()).await.unwrap();
        let query = redirect::parse_simulation(&init.redirect_target).unwrap();

        let callback = gw.confirm(&query).unwrap();
        assert!(callback.starts_with("/payment/callback?ref="));
        assert_eq!(gw.check_status(&init.reference).await.unwrap(), GatewayStatus::Success);

        let other = gw.initiate(request()).await.unwrap();
        assert_eq!(gw.cancel(&other.reference).unwrap(), "/payment?error=cancel");
        assert_eq!(gw.check_status(&other.reference).await.unwrap(), GatewayStatus::Failed);
    }

    #[tokio::test]
    async fn garbage_decision_reads_as_pending() {
        let store = Arc::new(MemoryStore::new());
        store.set("sim_status_r1", "maybe".to_string()).unwrap();
        let gw = SimulatedGateway::new(store, Arc::new(SeededIds::new(1)), Arc::new(SystemClock), "");
        assert_eq!(gw.check_status(&Reference::new("r1")).await.unwrap(), GatewayStatus::Pending);
    }

    #[tokio::test]
    async fn references_are_unique() {
        let gw = gateway();
        let a = gw.initiate(request()).await.unwrap();
        let b = gw.initiate(request()).await.unwrap();
        assert_ne!(a.reference, b.reference);
    }
}
