//! Implementation of the PostHistoryStore trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{to_count, to_millis};
use crate::{
    models::{PostRecord, PostTarget},
    persistence::{
        error::PersistenceError, sqlite::SqliteStateRepository, traits::PostHistoryStore,
    },
};

/// SQL query constants for post history operations. `sub_channel IS ?` makes
/// a missing sub-channel compare equal to NULL.
mod post_sql {
    pub const INSERT: &str =
        "INSERT INTO post_history (job_id, platform, sub_channel, posted_at) VALUES (?, ?, ?, ?)";

    pub const INSERT_IF_ALLOWED: &str = "INSERT INTO post_history (job_id, platform, \
                                         sub_channel, posted_at) SELECT ?, ?, ?, ? WHERE NOT \
                                         EXISTS (SELECT 1 FROM post_history WHERE platform = ? \
                                         AND sub_channel IS ? AND (posted_at >= ? OR (job_id = \
                                         ? AND posted_at >= ?)))";

    pub const EXISTS_FOR_JOB: &str = "SELECT COUNT(*) FROM post_history WHERE job_id = ? AND \
                                      platform = ? AND sub_channel IS ? AND posted_at >= ?";

    pub const EXISTS_FOR_TARGET: &str = "SELECT COUNT(*) FROM post_history WHERE platform = ? \
                                         AND sub_channel IS ? AND posted_at >= ?";

    pub const COUNT_SINCE: &str = "SELECT COUNT(*) FROM post_history WHERE posted_at >= ?";

    pub const COUNT_BY_PLATFORM: &str =
        "SELECT platform, COUNT(*) FROM post_history GROUP BY platform ORDER BY platform";

    pub const PURGE_BEFORE: &str = "DELETE FROM post_history WHERE posted_at < ?";
}

#[async_trait]
impl PostHistoryStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn insert(&self, record: &PostRecord) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "insert post record",
            sqlx::query(post_sql::INSERT)
                .bind(&record.job_id)
                .bind(&record.target.platform)
                .bind(record.target.sub_channel.as_deref())
                .bind(to_millis(record.posted_at))
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn try_insert(
        &self,
        record: &PostRecord,
        dedup_start: DateTime<Utc>,
        cooldown_start: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "insert post record if allowed",
                sqlx::query(post_sql::INSERT_IF_ALLOWED)
                    .bind(&record.job_id)
                    .bind(&record.target.platform)
                    .bind(record.target.sub_channel.as_deref())
                    .bind(to_millis(record.posted_at))
                    .bind(&record.target.platform)
                    .bind(record.target.sub_channel.as_deref())
                    .bind(to_millis(cooldown_start))
                    .bind(&record.job_id)
                    .bind(to_millis(dedup_start))
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn exists_for_job(
        &self,
        job_id: &str,
        target: &PostTarget,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "check post for job",
                sqlx::query_scalar::<_, i64>(post_sql::EXISTS_FOR_JOB)
                    .bind(job_id)
                    .bind(&target.platform)
                    .bind(target.sub_channel.as_deref())
                    .bind(to_millis(since))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn exists_for_target(
        &self,
        target: &PostTarget,
        since: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "check post for target",
                sqlx::query_scalar::<_, i64>(post_sql::EXISTS_FOR_TARGET)
                    .bind(&target.platform)
                    .bind(target.sub_channel.as_deref())
                    .bind(to_millis(since))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count > 0)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "count post records",
                sqlx::query_scalar::<_, i64>(post_sql::COUNT_SINCE)
                    .bind(to_millis(since))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }

    async fn count_by_platform(&self) -> Result<Vec<(String, u64)>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "count post records by platform",
                sqlx::query_as::<_, (String, i64)>(post_sql::COUNT_BY_PLATFORM)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(platform, count)| (platform, to_count(count))).collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "purge post records",
                sqlx::query(post_sql::PURGE_BEFORE).bind(to_millis(cutoff)).execute(&self.pool),
            )
            .await?;
        tracing::info!(purged = result.rows_affected(), "Purged post history records.");
        Ok(result.rows_affected())
    }
}
