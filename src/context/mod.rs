//! Application context and initialization logic.
//! This module loads configuration, opens and migrates the database, and
//! wires the dispatcher and post history tracker on top of it.

mod error;

use std::sync::Arc;

pub use error::AppContextError;

use crate::{
    config::AppConfig,
    engine::{NotificationDispatcher, PostHistoryTracker, RateLimiter},
    mailer::{Mailer, create_mailer},
    persistence::SqliteStateRepository,
};

/// The application context, holding configuration, the database repository
/// and the engine components built on top of it.
pub struct AppContext {
    /// Shared application configuration.
    pub config: AppConfig,

    /// The state repository backing every store.
    pub repo: Arc<SqliteStateRepository>,

    /// Email dispatcher for newly ingested jobs.
    pub dispatcher: NotificationDispatcher,

    /// Social post dedup and cooldown tracker.
    pub post_history: PostHistoryTracker,
}

/// A builder for the `AppContext`, allowing configuration overrides.
#[derive(Default)]
pub struct AppContextBuilder {
    /// Optional configuration directory to load settings from.
    config_dir: Option<String>,

    /// Optional fully built configuration, bypassing file loading.
    config: Option<AppConfig>,

    /// Optional override for the database URL.
    database_url_override: Option<String>,

    /// Optional mailer used instead of the configured one.
    mailer: Option<Arc<dyn Mailer>>,
}

impl AppContextBuilder {
    /// Creates a builder that loads configuration from `config_dir`.
    pub fn new(config_dir: Option<String>) -> Self {
        Self { config_dir, ..Default::default() }
    }

    /// Uses an already built configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a database URL override.
    pub fn database_url(mut self, url: String) -> Self {
        self.database_url_override = Some(url);
        self
    }

    /// Sets the mailer used by the dispatcher.
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Builds the `AppContext`: loads and validates configuration, runs
    /// migrations, and constructs the engine components.
    pub async fn build(self) -> Result<AppContext, AppContextError> {
        let mut config = match self.config {
            Some(config) => config,
            None => {
                tracing::debug!("Loading application configuration...");
                AppConfig::new(self.config_dir.as_deref())?
            }
        };

        if let Some(db_url) = self.database_url_override {
            tracing::info!(database_url = %db_url, "Overriding database URL.");
            config.database_url = db_url;
        }
        config.validate()?;
        tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

        tracing::debug!("Initializing state repository...");
        let repo = Arc::new(SqliteStateRepository::new(&config.database_url).await?);
        repo.run_migrations().await?;
        tracing::info!("Database migrations completed.");

        let mailer = match self.mailer {
            Some(mailer) => mailer,
            None => create_mailer(&config.mailer)?,
        };

        let rate_limiter = RateLimiter::new(repo.clone(), config.rate_limit.clone())?;
        let dispatcher = NotificationDispatcher::new(
            repo.clone(),
            repo.clone(),
            rate_limiter,
            mailer,
            &config.notifications,
        )?;
        let post_history = PostHistoryTracker::new(repo.clone(), &config.post_history);

        Ok(AppContext { config, repo, dispatcher, post_history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::NewAlert,
        persistence::AlertStore,
        test_helpers::{JobBuilder, RecordingMailer},
    };

    #[tokio::test]
    async fn test_build_wires_components_against_one_database() {
        let mailer = Arc::new(RecordingMailer::new());
        let context = AppContextBuilder::default()
            .config(AppConfig::builder().build())
            .mailer(mailer.clone())
            .build()
            .await
            .unwrap();

        context
            .repo
            .create(NewAlert {
                email: "dev@example.com".to_string(),
                keywords: vec!["rust".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let job = JobBuilder::new("job-1").title("Rust Engineer").build();
        let report = context.dispatcher.dispatch(&job).await.unwrap();

        assert_eq!(report.sent(), 1);
        assert_eq!(mailer.count_for("dev@example.com"), 1);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = AppConfig::builder().max_per_window(0).build();
        let result = AppContextBuilder::default().config(config).build().await;
        assert!(matches!(result, Err(AppContextError::Validation(_))));
    }
}
