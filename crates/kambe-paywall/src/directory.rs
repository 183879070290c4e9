//! Worker directory and the contact mask applied by the paywall
//!
//! Search results and profiles stay readable while locked; only the phone
//! and WhatsApp numbers are withheld until a session is active.

use crate::error::PaywallError;
use crate::keys;
use kambe_store::{JsonStoreExt, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Worker availability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Busy,
}

/// Moderation status of a worker profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    #[default]
    Active,
    Rejected,
    Suspended,
}

/// Worker profile
///
/// Fields not modelled here (photos, coordinates, ...) are carried in
/// `extra` so they survive a load/save cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub specialty_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood_id: Option<String>,
    #[serde(default)]
    pub whatsapp: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub account_status: AccountStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Worker {
    /// New active worker with no views
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        specialty_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            specialty_id: specialty_id.into(),
            neighborhood_id: None,
            whatsapp: String::new(),
            phone: String::new(),
            availability: Availability::Available,
            rating: 0.0,
            review_count: 0,
            is_verified: false,
            account_status: AccountStatus::Active,
            views: 0,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_contact(mut self, phone: impl Into<String>, whatsapp: impl Into<String>) -> Self {
        self.phone = phone.into();
        self.whatsapp = whatsapp.into();
        self
    }

    #[must_use]
    pub fn with_neighborhood(mut self, neighborhood_id: impl Into<String>) -> Self {
        self.neighborhood_id = Some(neighborhood_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.account_status = status;
        self
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Search criteria
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerFilter {
    pub specialty: Option<String>,
    pub neighborhood: Option<String>,
    pub status: AccountStatus,
}

impl WorkerFilter {
    #[must_use]
    pub fn specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    #[must_use]
    pub fn neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    fn matches(&self, worker: &Worker) -> bool {
        worker.account_status == self.status
            && self
                .specialty
                .as_ref()
                .map_or(true, |s| &worker.specialty_id == s)
            && self
                .neighborhood
                .as_ref()
                .map_or(true, |n| worker.neighborhood_id.as_ref() == Some(n))
    }
}

/// Contact field as seen through the paywall
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Contact {
    Masked,
    Visible(String),
}

impl Contact {
    fn reveal(value: &str, unlocked: bool) -> Self {
        if unlocked {
            Self::Visible(value.to_string())
        } else {
            Self::Masked
        }
    }

    #[must_use]
    pub fn as_visible(&self) -> Option<&str> {
        match self {
            Self::Masked => None,
            Self::Visible(v) => Some(v),
        }
    }
}

impl std::fmt::Display for Contact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Masked => f.write_str("•••• ••••"),
            Self::Visible(v) => f.write_str(v),
        }
    }
}

/// Worker profile with contact fields filtered by session state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerCard {
    pub id: String,
    pub display_name: String,
    pub specialty_id: String,
    pub neighborhood_id: Option<String>,
    pub availability: Availability,
    pub rating: f64,
    pub review_count: u32,
    pub is_verified: bool,
    pub phone: Contact,
    pub whatsapp: Contact,
}

impl WorkerCard {
    #[must_use]
    pub fn from_worker(worker: &Worker, unlocked: bool) -> Self {
        Self {
            id: worker.id.clone(),
            display_name: worker.display_name(),
            specialty_id: worker.specialty_id.clone(),
            neighborhood_id: worker.neighborhood_id.clone(),
            availability: worker.availability,
            rating: worker.rating,
            review_count: worker.review_count,
            is_verified: worker.is_verified,
            phone: Contact::reveal(&worker.phone, unlocked),
            whatsapp: Contact::reveal(&worker.whatsapp, unlocked),
        }
    }

    /// `https://wa.me/<digits>` when the WhatsApp number is visible
    #[must_use]
    pub fn whatsapp_link(&self) -> Option<String> {
        let number = self.whatsapp.as_visible()?;
        let digits: String = number.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then(|| format!("https://wa.me/{digits}"))
    }

    #[inline]
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.phone == Contact::Masked
    }
}

/// Worker repository over the durable store
#[derive(Debug, Clone)]
pub struct Directory {
    durable: Arc<dyn KeyValueStore>,
}

impl Directory {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self { durable }
    }

    fn load(&self) -> Vec<Worker> {
        self.durable.read_json_or(keys::WORKERS, Vec::new())
    }

    fn load_for_update(&self) -> Result<Vec<Worker>, PaywallError> {
        Ok(self.durable.read_json(keys::WORKERS)?.unwrap_or_default())
    }

    fn store(&self, workers: &[Worker]) -> Result<(), PaywallError> {
        self.durable.write_json(keys::WORKERS, workers)?;
        Ok(())
    }

    /// Every worker regardless of status
    #[must_use]
    pub fn list_all(&self) -> Vec<Worker> {
        self.load()
    }

    /// Workers matching `filter`
    #[must_use]
    pub fn query_workers(&self, filter: &WorkerFilter) -> Vec<Worker> {
        self.load()
            .into_iter()
            .filter(|w| filter.matches(w))
            .collect()
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Worker> {
        self.load().into_iter().find(|w| w.id == id)
    }

    /// Bump the view counter of `id`
    ///
    /// Returns false when no such worker exists.
    ///
    /// # Errors
    /// Propagates storage faults, including a stored directory that cannot
    /// be decoded
    pub fn increment_view_count(&self, id: &str) -> Result<bool, PaywallError> {
        let mut workers = self.load_for_update()?;
        let Some(worker) = workers.iter_mut().find(|w| w.id == id) else {
            return Ok(false);
        };
        worker.views = worker.views.saturating_add(1);
        self.store(&workers)?;
        Ok(true)
    }

    /// Insert or replace `worker`, keeping the stored view count on edit
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn save_worker(&self, mut worker: Worker) -> Result<(), PaywallError> {
        let mut workers = self.load_for_update()?;
        match workers.iter_mut().find(|w| w.id == worker.id) {
            Some(existing) => {
                worker.views = existing.views;
                *existing = worker;
            }
            None => workers.push(worker),
        }
        self.store(&workers)
    }

    /// Remove `id`; returns whether it existed
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn delete_worker(&self, id: &str) -> Result<bool, PaywallError> {
        let mut workers = self.load_for_update()?;
        let before = workers.len();
        workers.retain(|w| w.id != id);
        if workers.len() == before {
            return Ok(false);
        }
        self.store(&workers)?;
        Ok(true)
    }

    /// Replace the whole directory
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn replace_all(&self, workers: &[Worker]) -> Result<(), PaywallError> {
        self.store(workers)
    }

    /// The `n` most viewed workers
    #[must_use]
    pub fn top_viewed(&self, n: usize) -> Vec<Worker> {
        let mut workers = self.load();
        workers.sort_by(|a, b| b.views.cmp(&a.views));
        workers.truncate(n);
        workers
    }

    /// Write `workers` if the directory has never been written
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn seed_defaults(&self, workers: &[Worker]) -> Result<(), PaywallError> {
        if self.durable.get(keys::WORKERS)?.is_none() {
            self.store(workers)?;
            tracing::debug!(count = workers.len(), "worker directory seeded");
        }
        Ok(())
    }
}

/// Starter profiles written on first run
#[must_use]
pub fn default_workers() -> Vec<Worker> {
    let mut moussa = Worker::new("101", "Moussa", "Ibrahim", "1")
        .with_neighborhood("3")
        .with_contact("90000001", "22790000001");
    moussa.rating = 4.8;
    moussa.review_count = 24;
    moussa.is_verified = true;

    let mut abdoulaye = Worker::new("102", "Abdoulaye", "Sani", "2")
        .with_neighborhood("1")
        .with_contact("90000002", "22790000002");
    abdoulaye.availability = Availability::Busy;
    abdoulaye.rating = 4.2;
    abdoulaye.review_count = 15;
    abdoulaye.is_verified = true;

    let mut fatima = Worker::new("103", "Fatima", "Diallo", "5")
        .with_neighborhood("2")
        .with_contact("90000003", "22790000003");
    fatima.rating = 5.0;
    fatima.review_count = 8;

    vec![moussa, abdoulaye, fatima]
}
