//! Implementation of the RateLimitStore trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{to_count, to_millis};
use crate::persistence::{
    error::PersistenceError, sqlite::SqliteStateRepository, traits::RateLimitStore,
};

/// SQL query constants for rate limit operations
mod rate_limit_sql {
    pub const INSERT: &str = "INSERT INTO rate_limit_events (recipient, sent_at) VALUES (?, ?)";

    /// Check and increment in one statement so concurrent writers cannot
    /// both slip under the ceiling.
    pub const INSERT_BELOW_CEILING: &str = "INSERT INTO rate_limit_events (recipient, sent_at) \
                                            SELECT ?, ? WHERE (SELECT COUNT(*) FROM \
                                            rate_limit_events WHERE recipient = ? AND sent_at \
                                            >= ?) < ?";

    pub const COUNT_IN_WINDOW: &str =
        "SELECT COUNT(*) FROM rate_limit_events WHERE recipient = ? AND sent_at >= ?";

    pub const DELETE_SLOT: &str = "DELETE FROM rate_limit_events WHERE event_id = ?";

    pub const COUNTS_SINCE: &str = "SELECT recipient, COUNT(*) FROM rate_limit_events WHERE \
                                    sent_at >= ? GROUP BY recipient ORDER BY recipient";

    pub const PURGE_BEFORE: &str = "DELETE FROM rate_limit_events WHERE sent_at < ?";
}

#[async_trait]
impl RateLimitStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn increment(
        &self,
        recipient: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "increment rate limit",
                sqlx::query(rate_limit_sql::INSERT)
                    .bind(recipient)
                    .bind(to_millis(at))
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn count_in_window(
        &self,
        recipient: &str,
        window_start: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let count = self
            .execute_query_with_error_handling(
                "count rate limit window",
                sqlx::query_scalar::<_, i64>(rate_limit_sql::COUNT_IN_WINDOW)
                    .bind(recipient)
                    .bind(to_millis(window_start))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn try_increment(
        &self,
        recipient: &str,
        at: DateTime<Utc>,
        window_start: DateTime<Utc>,
        ceiling: u32,
    ) -> Result<Option<i64>, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "try increment rate limit",
                sqlx::query(rate_limit_sql::INSERT_BELOW_CEILING)
                    .bind(recipient)
                    .bind(to_millis(at))
                    .bind(recipient)
                    .bind(to_millis(window_start))
                    .bind(i64::from(ceiling))
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(recipient, ceiling, "Rate limit ceiling reached.");
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn remove(&self, slot_id: i64) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "remove rate limit slot",
            sqlx::query(rate_limit_sql::DELETE_SLOT).bind(slot_id).execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn counts_since(
        &self,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<(String, u64)>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "count rate limit recipients",
                sqlx::query_as::<_, (String, i64)>(rate_limit_sql::COUNTS_SINCE)
                    .bind(to_millis(window_start))
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(recipient, count)| (recipient, to_count(count))).collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "purge rate limit slots",
                sqlx::query(rate_limit_sql::PURGE_BEFORE)
                    .bind(to_millis(cutoff))
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}
