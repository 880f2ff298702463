//! Narrow store contracts consumed by the engine.
//!
//! Every mutation that guards an invariant (`reserve`, `try_increment`,
//! `try_insert`) must be a single atomic operation against the backing store
//! so that several dispatcher instances can share it without in-process
//! locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{Alert, NewAlert, NotificationRecord, PostRecord, PostTarget},
    persistence::error::PersistenceError,
};

/// Durable store of alert definitions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Returns every active alert.
    async fn list_active(&self) -> Result<Vec<Alert>, PersistenceError>;

    /// Validates and persists a new alert.
    async fn create(&self, alert: NewAlert) -> Result<Alert, PersistenceError>;

    /// Marks an alert inactive. Fails with `NotFound` for an unknown id.
    async fn deactivate(&self, alert_id: i64) -> Result<(), PersistenceError>;

    /// Retrieves an alert by id regardless of its active flag.
    async fn get(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError>;

    /// Returns the number of active alerts.
    async fn count_active(&self) -> Result<u64, PersistenceError>;
}

/// Append-only record of `(alert, job)` pairs already notified.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Atomically inserts the pair if absent. Returns whether the caller
    /// acquired it.
    async fn reserve(
        &self,
        alert_id: i64,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Removes a reservation that was never fulfilled.
    async fn release(&self, alert_id: i64, job_id: &str) -> Result<(), PersistenceError>;

    /// Returns whether a record exists for the pair.
    async fn contains(&self, alert_id: i64, job_id: &str) -> Result<bool, PersistenceError>;

    /// Retrieves the record for the pair, if any.
    async fn get_record(
        &self,
        alert_id: i64,
        job_id: &str,
    ) -> Result<Option<NotificationRecord>, PersistenceError>;

    /// Counts records taken at or after `since`.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError>;

    /// Deletes records taken before `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;

    /// Logs a failed delivery attempt for the pair.
    async fn record_failure(
        &self,
        alert_id: i64,
        job_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Returns failed attempts logged at or after `since`, counted per alert.
    async fn failures_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(i64, u64)>, PersistenceError>;

    /// Deletes failures logged before `cutoff`. Returns the number removed.
    async fn purge_failures_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}

/// Counter store behind the per-recipient rate limiter. Each increment is a
/// slot identified by an id so it can be refunded.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Unconditionally records a send for the recipient.
    async fn increment(&self, recipient: &str, at: DateTime<Utc>)
    -> Result<i64, PersistenceError>;

    /// Counts sends for the recipient at or after `window_start`.
    async fn count_in_window(
        &self,
        recipient: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, PersistenceError>;

    /// Atomically records a send only if the recipient has fewer than
    /// `ceiling` sends since `window_start`. Returns the slot id on success.
    async fn try_increment(
        &self,
        recipient: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
        ceiling: u32,
    ) -> Result<Option<i64>, PersistenceError>;

    /// Removes a slot previously returned by `increment` or `try_increment`.
    async fn remove(&self, slot_id: i64) -> Result<(), PersistenceError>;

    /// Returns per-recipient send counts at or after `window_start`.
    async fn counts_since(
        &self,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<(String, u64)>, PersistenceError>;

    /// Deletes slots recorded before `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}

/// Append-only log of social posts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostHistoryStore: Send + Sync {
    /// Appends a record unconditionally.
    async fn insert(&self, record: &PostRecord) -> Result<(), PersistenceError>;

    /// Appends a record only if no post of the same job to the same target
    /// exists since `dedup_start` and no post of any job to the same target
    /// exists since `cooldown_start`. Returns whether the record was written.
    async fn try_insert(
        &self,
        record: &PostRecord,
        dedup_start: DateTime<Utc>,
        cooldown_start: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Returns whether the job was posted to the target since `since`.
    async fn exists_for_job(
        &self,
        job_id: &str,
        target: &PostTarget,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Returns whether any job was posted to the target since `since`.
    async fn exists_for_target(
        &self,
        target: &PostTarget,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Counts records posted at or after `since`.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError>;

    /// Returns record counts per platform.
    async fn count_by_platform(&self) -> Result<Vec<(String, u64)>, PersistenceError>;

    /// Deletes records posted before `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError>;
}
