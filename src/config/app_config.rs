use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    ConfigValidationError, MailerConfig, NotificationConfig, PostHistoryConfig, RateLimitConfig,
};

/// Application configuration for the job alert service.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Per-recipient throttling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Email dispatch settings.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Social post dedup and cooldown windows.
    #[serde(default)]
    pub post_history: PostHistoryConfig,

    /// The email transport.
    #[serde(default)]
    pub mailer: MailerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            rate_limit: RateLimitConfig::default(),
            notifications: NotificationConfig::default(),
            post_history: PostHistoryConfig::default(),
            mailer: MailerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `JOB_ALERTS__*` environment variables taking
    /// precedence.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("JOB_ALERTS").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Validates every section that has invariants of its own.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.rate_limit.validate()?;
        self.notifications.validate()?;
        self.post_history.validate()?;
        Ok(())
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn max_per_window(mut self, max: u32) -> Self {
        self.config.rate_limit.max_per_window = max;
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.config.notifications.base_url = url.to_string();
        self
    }

    pub fn dedup_window(mut self, window: std::time::Duration) -> Self {
        self.config.post_history.dedup_window = window;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
