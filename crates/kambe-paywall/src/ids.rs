//! Payment reference generation
//!
//! References are v4 UUIDs. The secure generator draws from the operating
//! system; if that source fails it degrades to a time-seeded generator so a
//! payment can still be initiated.

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of unique payment references
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    /// Produce a fresh identifier
    fn next_id(&self) -> String;
}

fn uuid_from(bytes: [u8; 16]) -> String {
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

/// OS-backed generator with a non-cryptographic fallback
#[derive(Debug, Default)]
pub struct SecureIds {
    fallback: Mutex<Option<StdRng>>,
    counter: AtomicU64,
}

impl SecureIds {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fallback_bytes(&self, bytes: &mut [u8; 16]) {
        let mut guard = self.fallback.lock();
        let rng = guard.get_or_insert_with(|| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos());
            let salt = self.counter.fetch_add(1, Ordering::Relaxed);
            #[allow(clippy::cast_possible_truncation)]
            let seed = (nanos as u64) ^ salt.rotate_left(32);
            StdRng::seed_from_u64(seed)
        });
        rng.fill_bytes(bytes);
    }
}

impl IdGenerator for SecureIds {
    fn next_id(&self) -> String {
        let mut bytes = [0u8; 16];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            tracing::warn!(error = %e, "OS randomness unavailable, using time-seeded fallback");
            self.fallback_bytes(&mut bytes);
        }
        uuid_from(bytes)
    }
}

/// Deterministic generator for tests and replays
#[derive(Debug)]
pub struct SeededIds {
    rng: Mutex<StdRng>,
}

impl SeededIds {
    /// Create generator producing the same sequence for the same seed
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdGenerator for SeededIds {
    fn next_id(&self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.lock().fill_bytes(&mut bytes);
        uuid_from(bytes)
    }
}
