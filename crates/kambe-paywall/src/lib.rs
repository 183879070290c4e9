//! Kambegoye Paywall - payment reconciliation and time-bounded access
//!
//! This crate implements the paywall in front of the worker directory:
//! - Payment initiation through a [`PaymentGateway`] (simulated in-app)
//! - Redirect URL contract carrying payment parameters between contexts
//! - Idempotent transaction [`Ledger`] with revenue rollups
//! - [`Paywall`] reconciler turning a confirmed payment into a session
//! - Contact masking for worker profiles while locked
//!
//! # Architecture
//!
//! ```text
//!  initiate ──► PaymentGateway ──► /payment/simulation?ref=..
//!                                        │ confirm
//!                                        ▼
//!  finalize ◄── /payment/callback?ref=..&amount=..&phone=..&method=..
//!     │
//!     ├──► Ledger (durable)        append once per reference
//!     └──► SessionTracker (ephemeral)   Unlocked while now - start < duration
//! ```
//!
//! # Example
//!
//! ```rust
//! use kambe_paywall::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PaywallError> {
//! let stores = Stores::in_memory();
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let gateway = Arc::new(SimulatedGateway::new(
//!     Arc::clone(&stores.ephemeral),
//!     Arc::new(SecureIds::new()),
//!     Arc::clone(&clock),
//!     "",
//! ));
//! let paywall = Paywall::new(PaywallConfig::default(), stores, gateway.clone(), clock);
//!
//! let init = paywall.initiate_consultation(PaymentMethod::Mynita, "90000000").await?;
//! let query = redirect::parse_simulation(&init.redirect_target)?;
//! let callback = gateway.confirm(&query)?;
//!
//! let outcome = paywall.finalize_callback(&redirect::parse_callback(&callback)?).await;
//! assert!(outcome.unlocked());
//! assert!(paywall.is_unlocked());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod keys;
pub mod ledger;
pub mod notify;
pub mod paywall;
pub mod pending;
pub mod redirect;
pub mod report;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdminContact, PaywallConfig};
pub use directory::{
    AccountStatus, Availability, Contact, Directory, Worker, WorkerCard, WorkerFilter,
};
pub use error::{PaywallError, UnknownMethod};
pub use gateway::{GatewayStatus, Initiation, PaymentGateway, PaymentRequest, SimulatedGateway};
pub use ids::{IdGenerator, SecureIds, SeededIds};
pub use ledger::{AppendOutcome, Ledger};
pub use notify::{AdminNotifier, LogNotifier};
pub use paywall::{FinalizeOutcome, Paywall, PaymentOverride, Stores};
pub use pending::{PendingPayment, PendingPayments};
pub use report::{RevenueReport, RevenueWindows};
pub use session::{SessionState, SessionTracker};
pub use settings::{AdminAuth, AdminCredentials, Settings, SettingsPatch, SystemSettings};
pub use snapshot::DataSnapshot;
pub use types::{Amount, PaymentMethod, Reference, Transaction, TxStatus};

/// Prelude for common imports
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::PaywallConfig;
    pub use crate::error::PaywallError;
    pub use crate::gateway::{GatewayStatus, PaymentGateway, SimulatedGateway};
    pub use crate::ids::{IdGenerator, SecureIds, SeededIds};
    pub use crate::paywall::{FinalizeOutcome, Paywall, PaymentOverride, Stores};
    pub use crate::redirect;
    pub use crate::types::{Amount, PaymentMethod, Reference, Transaction};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
