//! Per-recipient sliding window rate limiting.
//!
//! A send at time `T` counts against every window that contains `T`; a
//! recipient is allowed another email while the number of sends in
//! `[now - window, now]` is below the ceiling. State lives entirely in the
//! [`RateLimitStore`] so every dispatcher instance sees the same counts.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};

use super::window_start;
use crate::{
    config::{ConfigValidationError, RateLimitConfig},
    models::{Alert, RateLimitStats},
    persistence::{NotificationLedger, PersistenceError, RateLimitStore},
};

/// A slot consumed by a successful [`RateLimiter::try_acquire`]. Keeping it
/// is the increment; handing it to [`RateLimiter::refund`] undoes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPermit {
    /// The recipient the slot was taken for.
    pub recipient: String,
    /// Store identifier of the slot.
    pub slot_id: i64,
}

/// Throttles alert emails per recipient.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    window: TimeDelta,
}

impl RateLimiter {
    /// Creates a rate limiter, rejecting a zero ceiling or an empty or oversized window.
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        config: RateLimitConfig,
    ) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        let window = TimeDelta::from_std(config.window)
            .map_err(|_| ConfigValidationError::WindowTooLong { name: "window_secs" })?;
        Ok(Self { store, config, window })
    }

    /// The configured ceiling.
    pub fn ceiling(&self) -> u32 {
        self.config.max_per_window
    }

    /// Start of the trailing window that ends at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        window_start(now, self.window)
    }

    /// Returns whether the recipient may receive another email now.
    pub async fn allow(&self, recipient: &str) -> Result<bool, PersistenceError> {
        self.allow_at(recipient, Utc::now()).await
    }

    /// Returns whether the recipient may receive another email at `now`.
    pub async fn allow_at(
        &self,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let recipient = recipient_key(recipient);
        let count = self.store.count_in_window(&recipient, self.window_start(now)).await?;
        Ok(count < u64::from(self.config.max_per_window))
    }

    /// Records a send for the recipient now, regardless of the ceiling.
    pub async fn record(&self, recipient: &str) -> Result<(), PersistenceError> {
        self.record_at(recipient, Utc::now()).await
    }

    /// Records a send for the recipient at `now`, regardless of the ceiling.
    pub async fn record_at(
        &self,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.store.increment(&recipient_key(recipient), now).await?;
        Ok(())
    }

    /// Atomically checks the ceiling and records a send. Returns `None` when
    /// the recipient is already at the ceiling.
    pub async fn try_acquire_at(
        &self,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RateLimitPermit>, PersistenceError> {
        let recipient = recipient_key(recipient);
        let slot = self
            .store
            .try_increment(&recipient, now, self.window_start(now), self.config.max_per_window)
            .await?;
        Ok(slot.map(|slot_id| RateLimitPermit { recipient, slot_id }))
    }

    /// Gives back a slot whose email was never delivered.
    pub async fn refund(&self, permit: &RateLimitPermit) -> Result<(), PersistenceError> {
        tracing::debug!(
            recipient = %permit.recipient,
            slot_id = permit.slot_id,
            "Refunding rate limit slot."
        );
        self.store.remove(permit.slot_id).await
    }

    /// Derives throttling and delivery failure statistics for the given active
    /// alerts.
    pub async fn stats_at(
        &self,
        active_alerts: &[Alert],
        ledger: &dyn NotificationLedger,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStats, PersistenceError> {
        let ceiling = u64::from(self.config.max_per_window);
        let limited: HashSet<String> = self
            .store
            .counts_since(self.window_start(now))
            .await?
            .into_iter()
            .filter(|(_, count)| *count >= ceiling)
            .map(|(recipient, _)| recipient)
            .collect();

        let rate_limited_alerts = active_alerts
            .iter()
            .filter(|alert| limited.contains(&recipient_key(&alert.email)))
            .count();
        let day_start = window_start(now, TimeDelta::hours(24));
        let emails_last_24h = ledger.count_since(day_start).await?;

        let failures = ledger.failures_since(day_start).await?;
        let failed_last_24h = failures.iter().map(|(_, count)| count).sum();
        let failing: HashSet<i64> = failures.into_iter().map(|(alert_id, _)| alert_id).collect();
        let failing_alerts =
            active_alerts.iter().filter(|alert| failing.contains(&alert.id)).count();

        Ok(RateLimitStats {
            total_active_alerts: active_alerts.len() as u64,
            rate_limited_alerts: rate_limited_alerts as u64,
            rate_limited_recipients: limited.len() as u64,
            emails_last_24h,
            failed_last_24h,
            failing_alerts: failing_alerts as u64,
        })
    }

    /// Deletes slots that have left the window. Returns the number removed.
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64, PersistenceError> {
        self.store.purge_before(self.window_start(now)).await
    }
}

/// Counters are keyed by the lowercase address so one mailbox is throttled
/// once however its alerts spell it.
fn recipient_key(email: &str) -> String {
    email.trim().to_lowercase()
}
