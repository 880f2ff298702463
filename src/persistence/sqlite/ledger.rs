//! Implementation of the NotificationLedger trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{from_millis, to_count, to_millis};
use crate::{
    models::NotificationRecord,
    persistence::{
        error::PersistenceError, sqlite::SqliteStateRepository, traits::NotificationLedger,
    },
};

/// SQL query constants for ledger operations
mod ledger_sql {
    /// The primary key on `(alert_id, job_id)` makes this the atomic
    /// insert-if-absent.
    pub const RESERVE: &str =
        "INSERT OR IGNORE INTO notification_ledger (alert_id, job_id, sent_at) VALUES (?, ?, ?)";

    pub const RELEASE: &str = "DELETE FROM notification_ledger WHERE alert_id = ? AND job_id = ?";

    pub const CONTAINS: &str =
        "SELECT COUNT(*) FROM notification_ledger WHERE alert_id = ? AND job_id = ?";

    pub const COUNT_SINCE: &str = "SELECT COUNT(*) FROM notification_ledger WHERE sent_at >= ?";

    pub const SELECT: &str = "SELECT alert_id, job_id, sent_at FROM notification_ledger WHERE \
                              alert_id = ? AND job_id = ?";

    pub const PURGE_BEFORE: &str = "DELETE FROM notification_ledger WHERE sent_at < ?";

    pub const INSERT_FAILURE: &str = "INSERT INTO delivery_failures (alert_id, job_id, reason, \
                                      failed_at) VALUES (?, ?, ?, ?)";

    pub const FAILURES_SINCE: &str = "SELECT alert_id, COUNT(*) FROM delivery_failures WHERE \
                                      failed_at >= ? GROUP BY alert_id ORDER BY alert_id";

    pub const PURGE_FAILURES_BEFORE: &str = "DELETE FROM delivery_failures WHERE failed_at < ?";
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    alert_id: i64,
    job_id: String,
    sent_at: i64,
}

impl TryFrom<LedgerRow> for NotificationRecord {
    type Error = PersistenceError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(NotificationRecord {
            alert_id: row.alert_id,
            job_id: row.job_id,
            sent_at: from_millis(row.sent_at)?,
        })
    }
}

#[async_trait]
impl NotificationLedger for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn reserve(
        &self,
        alert_id: i64,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "reserve notification",
                sqlx::query(ledger_sql::RESERVE)
                    .bind(alert_id)
                    .bind(job_id)
                    .bind(to_millis(at))
                    .execute(&self.pool),
            )
            .await?;

        let acquired = result.rows_affected() == 1;
        tracing::debug!(alert_id, job_id, acquired, "Notification reservation attempted.");
        Ok(acquired)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn release(&self, alert_id: i64, job_id: &str) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "release notification",
            sqlx::query(ledger_sql::RELEASE).bind(alert_id).bind(job_id).execute(&self.pool),
        )
        .await?;
        tracing::debug!(alert_id, job_id, "Notification reservation released.");
        Ok(())
    }

    async fn contains(&self, alert_id: i64, job_id: &str) -> Result<bool, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "check notification",
                sqlx::query_scalar::<_, i64>(ledger_sql::CONTAINS)
                    .bind(alert_id)
                    .bind(job_id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn get_record(
        &self,
        alert_id: i64,
        job_id: &str,
    ) -> Result<Option<NotificationRecord>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get notification",
                sqlx::query_as::<_, LedgerRow>(ledger_sql::SELECT)
                    .bind(alert_id)
                    .bind(job_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(NotificationRecord::try_from).transpose()
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "count notifications",
                sqlx::query_scalar::<_, i64>(ledger_sql::COUNT_SINCE)
                    .bind(to_millis(since))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "purge notifications",
                sqlx::query(ledger_sql::PURGE_BEFORE).bind(to_millis(cutoff)).execute(&self.pool),
            )
            .await?;
        tracing::info!(purged = result.rows_affected(), "Purged notification ledger records.");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn record_failure(
        &self,
        alert_id: i64,
        job_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "record delivery failure",
            sqlx::query(ledger_sql::INSERT_FAILURE)
                .bind(alert_id)
                .bind(job_id)
                .bind(reason)
                .bind(to_millis(at))
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn failures_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(i64, u64)>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "count delivery failures",
                sqlx::query_as::<_, (i64, i64)>(ledger_sql::FAILURES_SINCE)
                    .bind(to_millis(since))
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(alert_id, count)| (alert_id, to_count(count))).collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn purge_failures_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "purge delivery failures",
                sqlx::query(ledger_sql::PURGE_FAILURES_BEFORE)
                    .bind(to_millis(cutoff))
                    .execute(&self.pool),
            )
            .await?;
        tracing::info!(purged = result.rows_affected(), "Purged delivery failures.");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::persistence::sqlite::setup_test_db;

    #[tokio::test]
    async fn test_reserve_is_insert_if_absent() {
        let repo = setup_test_db().await;
        let now = Utc::now();

        assert!(repo.reserve(1, "job-1", now).await.unwrap());
        assert!(!repo.reserve(1, "job-1", now).await.unwrap());
        assert!(repo.reserve(2, "job-1", now).await.unwrap());
        assert!(repo.reserve(1, "job-2", now).await.unwrap());
        assert!(repo.contains(1, "job-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_allows_new_reservation() {
        let repo = setup_test_db().await;
        let now = Utc::now();

        assert!(repo.reserve(1, "job-1", now).await.unwrap());
        repo.release(1, "job-1").await.unwrap();
        assert!(!repo.contains(1, "job-1").await.unwrap());
        assert!(repo.reserve(1, "job-1", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_of_missing_pair_is_a_no_op() {
        let repo = setup_test_db().await;
        repo.release(7, "job-7").await.unwrap();
    }

    #[tokio::test]
    async fn test_count_since_and_purge() {
        let repo = setup_test_db().await;
        let now = Utc::now();

        repo.reserve(1, "old", now - TimeDelta::days(40)).await.unwrap();
        repo.reserve(1, "recent", now - TimeDelta::hours(2)).await.unwrap();
        repo.reserve(2, "recent", now).await.unwrap();

        assert_eq!(repo.count_since(now - TimeDelta::hours(24)).await.unwrap(), 2);
        assert_eq!(repo.purge_before(now - TimeDelta::days(30)).await.unwrap(), 1);
        assert!(!repo.contains(1, "old").await.unwrap());
        assert!(repo.contains(1, "recent").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_returns_record() {
        let repo = setup_test_db().await;
        let at = from_millis(to_millis(Utc::now())).unwrap();

        assert_eq!(repo.get_record(1, "job-1").await.unwrap(), None);
        repo.reserve(1, "job-1", at).await.unwrap();

        let record = repo.get_record(1, "job-1").await.unwrap();
        assert_eq!(
            record,
            Some(NotificationRecord { alert_id: 1, job_id: "job-1".to_string(), sent_at: at })
        );
    }

    #[tokio::test]
    async fn test_failures_are_counted_per_alert_and_purged() {
        let repo = setup_test_db().await;
        let now = Utc::now();

        repo.record_failure(1, "job-1", "rejected", now - TimeDelta::days(2)).await.unwrap();
        repo.record_failure(1, "job-2", "rejected", now).await.unwrap();
        repo.record_failure(1, "job-3", "timed out", now).await.unwrap();
        repo.record_failure(3, "job-1", "rejected", now).await.unwrap();

        let failures = repo.failures_since(now - TimeDelta::hours(24)).await.unwrap();
        assert_eq!(failures, vec![(1, 2), (3, 1)]);
        assert!(!repo.contains(1, "job-1").await.unwrap());

        assert_eq!(repo.purge_failures_before(now - TimeDelta::days(1)).await.unwrap(), 1);
        assert_eq!(repo.failures_since(now - TimeDelta::days(30)).await.unwrap().len(), 2);
    }
}
