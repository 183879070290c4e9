//! Paywall session tracking
//!
//! The session is a single start instant in the ephemeral store. Whether it
//! is active is recomputed from `(now, start)` on every read; there is no
//! timer. Once a read observes expiry the marker is cleared.

use crate::error::PaywallError;
use crate::keys;
use chrono::{DateTime, Utc};
use kambe_store::KeyValueStore;
use std::sync::Arc;

/// Paywall state for one browsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Contact details hidden
    Locked,
    /// Contact details visible
    Unlocked {
        started_at: DateTime<Utc>,
        remaining_secs: u64,
    },
}

impl SessionState {
    #[inline]
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked { .. })
    }

    /// Whole seconds left, zero when locked
    #[inline]
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        match self {
            Self::Locked => 0,
            Self::Unlocked { remaining_secs, .. } => *remaining_secs,
        }
    }
}

/// Milliseconds left in a window of `duration_ms` started at `start`
///
/// Never negative. A start in the future counts as just started.
#[must_use]
pub fn remaining_millis(duration_ms: i64, start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - start).num_milliseconds().max(0);
    (duration_ms - elapsed).max(0)
}

/// Whole seconds left, rounding partial seconds up
#[must_use]
pub fn remaining_secs(duration_ms: i64, start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = remaining_millis(duration_ms, start, now);
    u64::try_from((millis + 999) / 1000).unwrap_or(0)
}

/// Reads and writes the session marker
#[derive(Debug, Clone)]
pub struct SessionTracker {
    ephemeral: Arc<dyn KeyValueStore>,
    duration_ms: i64,
}

impl SessionTracker {
    /// Create tracker for sessions lasting `duration`
    pub fn new(ephemeral: Arc<dyn KeyValueStore>, duration: std::time::Duration) -> Self {
        Self {
            ephemeral,
            duration_ms: i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Begin a session at `now`, replacing any previous one
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn start(&self, now: DateTime<Utc>) -> Result<(), PaywallError> {
        self.ephemeral
            .set(keys::PAID_SESSION, now.timestamp_millis().to_string())?;
        tracing::info!(started_at = %now, "paywall session started");
        Ok(())
    }

    /// Drop the session marker
    ///
    /// # Errors
    /// Propagates storage faults
    pub fn end(&self) -> Result<(), PaywallError> {
        self.ephemeral.delete(keys::PAID_SESSION)?;
        Ok(())
    }

    fn started_at(&self) -> Option<Option<DateTime<Utc>>> {
        let raw = match self.ephemeral.get(keys::PAID_SESSION) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "session marker unreadable");
                return None;
            }
        };
        Some(
            raw.trim()
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis),
        )
    }

    fn clear_stale(&self) {
        if let Err(e) = self.ephemeral.delete(keys::PAID_SESSION) {
            tracing::warn!(error = %e, "failed to clear stale session marker");
        }
    }

    /// State at `now`
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        let start = match self.started_at() {
            None => return SessionState::Locked,
            Some(None) => {
                tracing::debug!("discarding unparsable session marker");
                self.clear_stale();
                return SessionState::Locked;
            }
            Some(Some(start)) => start,
        };

        if remaining_millis(self.duration_ms, start, now) > 0 {
            SessionState::Unlocked {
                started_at: start,
                remaining_secs: remaining_secs(self.duration_ms, start, now),
            }
        } else {
            tracing::debug!(started_at = %start, "paywall session expired");
            self.clear_stale();
            SessionState::Locked
        }
    }

    #[inline]
    pub fn is_unlocked(&self, now: DateTime<Utc>) -> bool {
        self.state(now).is_unlocked()
    }

    #[inline]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.state(now).remaining_secs()
    }
}
