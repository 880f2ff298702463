//! Implementation of the AlertStore trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::Utc;

use super::{from_millis, to_count, to_millis};
use crate::{
    models::{Alert, NewAlert},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::AlertStore},
};

/// SQL query constants for alert operations
mod alert_sql {
    pub const SELECT_ACTIVE: &str = "SELECT alert_id, email, keywords, technologies, locations, \
                                     active, created_at FROM alerts WHERE active = 1 ORDER BY \
                                     alert_id";

    pub const SELECT_BY_ID: &str = "SELECT alert_id, email, keywords, technologies, locations, \
                                    active, created_at FROM alerts WHERE alert_id = ?";

    pub const INSERT: &str = "INSERT INTO alerts (email, keywords, technologies, locations, \
                              active, created_at) VALUES (?, ?, ?, ?, 1, ?)";

    pub const DEACTIVATE: &str = "UPDATE alerts SET active = 0 WHERE alert_id = ?";

    pub const COUNT_ACTIVE: &str = "SELECT COUNT(*) FROM alerts WHERE active = 1";
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: i64,
    email: String,
    keywords: String,
    technologies: String,
    locations: String,
    active: bool,
    created_at: i64,
}

impl TryFrom<AlertRow> for Alert {
    type Error = PersistenceError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Alert {
            id: row.alert_id,
            email: row.email,
            keywords: decode_terms(&row.keywords)?,
            technologies: decode_terms(&row.technologies)?,
            locations: decode_terms(&row.locations)?,
            active: row.active,
            created_at: from_millis(row.created_at)?,
        })
    }
}

fn decode_terms(raw: &str) -> Result<Vec<String>, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

fn encode_terms(terms: &[String]) -> Result<String, PersistenceError> {
    serde_json::to_string(terms).map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

#[async_trait]
impl AlertStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_active(&self) -> Result<Vec<Alert>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "list active alerts",
                sqlx::query_as::<_, AlertRow>(alert_sql::SELECT_ACTIVE).fetch_all(&self.pool),
            )
            .await?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let alert_id = row.alert_id;
            match Alert::try_from(row) {
                Ok(alert) => alerts.push(alert),
                Err(e) => {
                    // A corrupt row must not hide every other alert.
                    tracing::error!(alert_id, error = %e, "Failed to decode alert row.");
                }
            }
        }
        tracing::debug!(count = alerts.len(), "Loaded active alerts.");
        Ok(alerts)
    }

    #[tracing::instrument(skip(self, alert), fields(email = %alert.email), level = "debug")]
    async fn create(&self, alert: NewAlert) -> Result<Alert, PersistenceError> {
        let alert = alert.validate().inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected invalid alert definition.");
        })?;
        let created_at = from_millis(to_millis(Utc::now()))?;

        let result = self
            .execute_query_with_error_handling(
                "create alert",
                sqlx::query(alert_sql::INSERT)
                    .bind(&alert.email)
                    .bind(encode_terms(&alert.keywords)?)
                    .bind(encode_terms(&alert.technologies)?)
                    .bind(encode_terms(&alert.locations)?)
                    .bind(to_millis(created_at))
                    .execute(&self.pool),
            )
            .await?;

        let alert_id = result.last_insert_rowid();
        tracing::info!(alert_id, "Alert created.");
        Ok(Alert {
            id: alert_id,
            email: alert.email,
            keywords: alert.keywords,
            technologies: alert.technologies,
            locations: alert.locations,
            active: true,
            created_at,
        })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn deactivate(&self, alert_id: i64) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "deactivate alert",
                sqlx::query(alert_sql::DEACTIVATE).bind(alert_id).execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("Alert {alert_id}")));
        }
        tracing::info!(alert_id, "Alert deactivated.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get alert",
                sqlx::query_as::<_, AlertRow>(alert_sql::SELECT_BY_ID)
                    .bind(alert_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Alert::try_from).transpose()
    }

    async fn count_active(&self) -> Result<u64, PersistenceError> {
        let count: i64 = self
            .execute_query_with_error_handling(
                "count active alerts",
                sqlx::query_scalar::<_, i64>(alert_sql::COUNT_ACTIVE).fetch_one(&self.pool),
            )
            .await?;
        Ok(to_count(count))
    }
}
