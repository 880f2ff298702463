//! Deduplication and cooldown for re-posting jobs to social platforms.
//!
//! Two windows gate a post to a [`PostTarget`]:
//! - the dedup window: the same job is not posted to the same target twice;
//! - the cooldown: the target receives at most one post of any job.
//!
//! Both are evaluated against the shared [`PostHistoryStore`], so several
//! publishers can consult the same history.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::{to_delta, window_start};
use crate::{
    config::PostHistoryConfig,
    models::{PostHistoryStats, PostRecord, PostTarget},
    persistence::{PersistenceError, PostHistoryStore},
};

/// Decides whether a job may be posted to a target and records posts.
pub struct PostHistoryTracker {
    store: Arc<dyn PostHistoryStore>,
    dedup_window: TimeDelta,
    cooldown: TimeDelta,
}

impl PostHistoryTracker {
    /// Creates a tracker with the configured windows.
    pub fn new(store: Arc<dyn PostHistoryStore>, config: &PostHistoryConfig) -> Self {
        Self {
            store,
            dedup_window: to_delta(config.dedup_window),
            cooldown: to_delta(config.cooldown),
        }
    }

    /// Returns whether the job may be posted to the target now.
    pub async fn can_post(
        &self,
        job_id: &str,
        target: &PostTarget,
    ) -> Result<bool, PersistenceError> {
        self.can_post_at(job_id, target, Utc::now()).await
    }

    /// Returns whether the job may be posted to the target at `now`.
    ///
    /// The cooldown check ignores job identity; the dedup check does not.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn can_post_at(
        &self,
        job_id: &str,
        target: &PostTarget,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        if self.store.exists_for_target(target, window_start(now, self.cooldown)).await? {
            tracing::debug!("Target is cooling down.");
            return Ok(false);
        }
        if self.store.exists_for_job(job_id, target, window_start(now, self.dedup_window)).await? {
            tracing::debug!("Job was already posted to target.");
            return Ok(false);
        }
        Ok(true)
    }

    /// Records a post made now.
    pub async fn record(&self, job_id: &str, target: &PostTarget) -> Result<(), PersistenceError> {
        self.record_at(job_id, target, Utc::now()).await
    }

    /// Records a post made at `now`, without checking either window.
    pub async fn record_at(
        &self,
        job_id: &str,
        target: &PostTarget,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let record =
            PostRecord { job_id: job_id.to_string(), target: target.clone(), posted_at: now };
        self.store.insert(&record).await?;
        tracing::info!(job_id, target = %target, "Recorded post.");
        Ok(())
    }

    /// Checks both windows and records the post in one atomic step. Returns
    /// whether the caller may publish.
    pub async fn try_record(
        &self,
        job_id: &str,
        target: &PostTarget,
    ) -> Result<bool, PersistenceError> {
        self.try_record_at(job_id, target, Utc::now()).await
    }

    /// Atomic check-then-record at `now`.
    pub async fn try_record_at(
        &self,
        job_id: &str,
        target: &PostTarget,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let record =
            PostRecord { job_id: job_id.to_string(), target: target.clone(), posted_at: now };
        let recorded = self
            .store
            .try_insert(
                &record,
                window_start(now, self.dedup_window),
                window_start(now, self.cooldown),
            )
            .await?;

        if recorded {
            tracing::info!(job_id, target = %target, "Recorded post.");
        } else {
            tracing::debug!(job_id, target = %target, "Post refused by dedup or cooldown window.");
        }
        Ok(recorded)
    }

    /// Purges records older than `retention_days`. Records inside the dedup
    /// window or the cooldown are kept whatever the retention.
    pub async fn cleanup(&self, retention_days: u32) -> Result<u64, PersistenceError> {
        self.cleanup_at(retention_days, Utc::now()).await
    }

    /// Purges as of `now`. Returns the number of records removed.
    pub async fn cleanup_at(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let retention = TimeDelta::try_days(i64::from(retention_days)).unwrap_or(TimeDelta::MAX);
        let horizon = retention.max(self.dedup_window).max(self.cooldown);
        let removed = self.store.purge_before(window_start(now, horizon)).await?;
        tracing::info!(removed, retention_days, "Post history cleanup finished.");
        Ok(removed)
    }

    /// Current post volume.
    pub async fn stats(&self) -> Result<PostHistoryStats, PersistenceError> {
        self.stats_at(Utc::now()).await
    }

    /// Post volume as of `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<PostHistoryStats, PersistenceError> {
        Ok(PostHistoryStats {
            total: self.store.count_since(DateTime::UNIX_EPOCH).await?,
            last_7_days: self.store.count_since(window_start(now, TimeDelta::days(7))).await?,
            last_30_days: self.store.count_since(window_start(now, TimeDelta::days(30))).await?,
            by_platform: self.store.count_by_platform().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};

    use super::*;
    use crate::{config::days, persistence::traits::MockPostHistoryStore};

    fn tracker(store: MockPostHistoryStore) -> PostHistoryTracker {
        PostHistoryTracker::new(Arc::new(store), &PostHistoryConfig::default())
    }

    fn reddit() -> PostTarget {
        PostTarget::new("reddit", Some("r/programming"))
    }

    #[tokio::test]
    async fn test_cooldown_blocks_without_checking_job() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store
            .expect_exists_for_target()
            .with(eq(reddit()), eq(now - TimeDelta::hours(72)))
            .times(1)
            .returning(|_, _| Ok(true));
        store.expect_exists_for_job().never();

        assert!(!tracker(store).can_post_at("job-b", &reddit(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_dedup_window_checked_after_cooldown() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store.expect_exists_for_target().returning(|_, _| Ok(false));
        store
            .expect_exists_for_job()
            .with(eq("job-a"), eq(reddit()), eq(now - TimeDelta::days(7)))
            .times(1)
            .returning(|_, _, _| Ok(true));

        assert!(!tracker(store).can_post_at("job-a", &reddit(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_record_passes_both_window_starts() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store
            .expect_try_insert()
            .withf(move |record, dedup_start, cooldown_start| {
                record.job_id == "job-a"
                    && record.posted_at == now
                    && *dedup_start == now - TimeDelta::days(7)
                    && *cooldown_start == now - TimeDelta::hours(72)
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        assert!(tracker(store).try_record_at("job-a", &reddit(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_never_cuts_into_active_windows() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store
            .expect_purge_before()
            .with(eq(now - TimeDelta::days(7)))
            .times(1)
            .returning(|_| Ok(0));

        tracker(store).cleanup_at(1, now).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_with_maximum_retention_keeps_everything() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store
            .expect_purge_before()
            .with(eq(DateTime::<Utc>::MIN_UTC))
            .times(1)
            .returning(|_| Ok(0));

        assert_eq!(tracker(store).cleanup_at(u32::MAX, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_huge_windows_cover_all_history() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store
            .expect_exists_for_target()
            .with(eq(reddit()), eq(DateTime::<Utc>::MIN_UTC))
            .returning(|_, _| Ok(false));
        store
            .expect_exists_for_job()
            .with(eq("job-a"), eq(reddit()), eq(DateTime::<Utc>::MIN_UTC))
            .returning(|_, _, _| Ok(true));
        store
            .expect_try_insert()
            .withf(|_, dedup_start, cooldown_start| {
                *dedup_start == DateTime::<Utc>::MIN_UTC
                    && *cooldown_start == DateTime::<Utc>::MIN_UTC
            })
            .returning(|_, _, _| Ok(false));

        let config = PostHistoryConfig {
            dedup_window: days(200_000_000),
            cooldown: std::time::Duration::MAX,
            ..Default::default()
        };
        let tracker = PostHistoryTracker::new(Arc::new(store), &config);

        assert!(!tracker.can_post_at("job-a", &reddit(), now).await.unwrap());
        assert!(!tracker.try_record_at("job-a", &reddit(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_aggregates_store_counts() {
        let now = Utc::now();
        let mut store = MockPostHistoryStore::new();
        store.expect_count_since().with(eq(DateTime::UNIX_EPOCH)).returning(|_| Ok(12));
        store.expect_count_since().with(eq(now - TimeDelta::days(7))).returning(|_| Ok(3));
        store.expect_count_since().with(eq(now - TimeDelta::days(30))).returning(|_| Ok(9));
        store.expect_count_by_platform().returning(|| {
            Ok(vec![("reddit".to_string(), 8), ("twitter".to_string(), 4)])
        });

        let stats = tracker(store).stats_at(now).await.unwrap();
        assert_eq!(stats.total, 12);
        assert_eq!(stats.last_7_days, 3);
        assert_eq!(stats.last_30_days, 9);
        assert_eq!(stats.by_platform.len(), 2);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockPostHistoryStore::new();
        store
            .expect_exists_for_target()
            .with(always(), always())
            .returning(|_, _| Err(PersistenceError::OperationFailed("db down".to_string())));

        let result = tracker(store).can_post("job-a", &reddit()).await;
        assert!(matches!(result, Err(PersistenceError::OperationFailed(_))));
    }
}
