//! Typed configuration sections for the dispatcher, the rate limiter and the
//! post history tracker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::{
    HttpRetryConfig, days, deserialize_duration_from_days, deserialize_duration_from_hours,
    deserialize_duration_from_ms, deserialize_duration_from_seconds, hours,
    serialize_duration_to_days, serialize_duration_to_hours, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};

/// Errors raised when a configuration section holds values the engine cannot
/// work with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// The rate limit ceiling must allow at least one email per window.
    #[error("Rate limit ceiling must be at least 1, got {0}")]
    InvalidRateLimitCeiling(u32),

    /// The rate limit window must be non-zero.
    #[error("Rate limit window must be greater than zero")]
    EmptyRateLimitWindow,

    /// The mailer timeout must be non-zero.
    #[error("Mailer timeout must be greater than zero")]
    EmptyMailerTimeout,

    /// The base URL used for call-to-action links could not be parsed.
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// A time window is longer than the engine accepts.
    #[error("{name} must not exceed {max} days", max = MAX_WINDOW_DAYS)]
    WindowTooLong {
        /// The offending setting.
        name: &'static str,
    },
}

/// Upper bound, in days, on every configured time window.
pub const MAX_WINDOW_DAYS: u64 = 36_500;

fn check_window(name: &'static str, window: Duration) -> Result<(), ConfigValidationError> {
    if window > days(MAX_WINDOW_DAYS) {
        return Err(ConfigValidationError::WindowTooLong { name });
    }
    Ok(())
}

fn default_max_per_window() -> u32 {
    1
}

fn default_rate_limit_window() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Per-recipient throttling of alert emails.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of emails one recipient may receive inside the window.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,

    /// Length of the trailing window.
    #[serde(
        rename = "window_secs",
        default = "default_rate_limit_window",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_per_window: default_max_per_window(), window: default_rate_limit_window() }
    }
}

impl RateLimitConfig {
    /// Checks that the ceiling and window describe a usable limit.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_per_window == 0 {
            return Err(ConfigValidationError::InvalidRateLimitCeiling(self.max_per_window));
        }
        if self.window.is_zero() {
            return Err(ConfigValidationError::EmptyRateLimitWindow);
        }
        check_window("window_secs", self.window)
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_mailer_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_notification_retention() -> Duration {
    days(30)
}

/// The default subject template for alert emails.
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "New job match: {{ job.title }} at {{ job.company }}";

/// The default body template for alert emails.
pub const DEFAULT_BODY_TEMPLATE: &str = "Hi,

A new job matches your alert ({{ matched_keywords | join(\", \") }}).

{{ job.title }} at {{ job.company }}
Location: {{ job.location }}{% if job.remote %} (remote){% endif %}
{% if job.technologies %}Technologies: {{ job.technologies | join(\", \") }}
{% endif %}
View the job: {{ job_url }}
";

fn default_subject_template() -> String {
    DEFAULT_SUBJECT_TEMPLATE.to_string()
}

fn default_body_template() -> String {
    DEFAULT_BODY_TEMPLATE.to_string()
}

/// Settings for alert email dispatch.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Public base URL used to build the call-to-action link of each email.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single mailer call. Expiry counts as a delivery
    /// failure.
    #[serde(
        rename = "mailer_timeout_ms",
        default = "default_mailer_timeout",
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub mailer_timeout: Duration,

    /// How long ledger records are kept before `cleanup` may purge them.
    #[serde(
        rename = "retention_days",
        default = "default_notification_retention",
        deserialize_with = "deserialize_duration_from_days",
        serialize_with = "serialize_duration_to_days"
    )]
    pub retention: Duration,

    /// minijinja template for the email subject.
    #[serde(default = "default_subject_template")]
    pub subject_template: String,

    /// minijinja template for the email body.
    #[serde(default = "default_body_template")]
    pub body_template: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mailer_timeout: default_mailer_timeout(),
            retention: default_notification_retention(),
            subject_template: default_subject_template(),
            body_template: default_body_template(),
        }
    }
}

impl NotificationConfig {
    /// Checks the timeout, the retention and the base URL.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.mailer_timeout.is_zero() {
            return Err(ConfigValidationError::EmptyMailerTimeout);
        }
        check_window("notifications.retention_days", self.retention)?;
        Url::parse(&self.base_url)
            .map_err(|_| ConfigValidationError::InvalidBaseUrl(self.base_url.clone()))?;
        Ok(())
    }
}

fn default_dedup_window() -> Duration {
    days(7)
}

fn default_cooldown() -> Duration {
    hours(72)
}

fn default_post_retention() -> Duration {
    days(30)
}

/// Windows used by the social post history tracker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PostHistoryConfig {
    /// The same job is not re-posted to the same target inside this window.
    #[serde(
        rename = "dedup_window_days",
        default = "default_dedup_window",
        deserialize_with = "deserialize_duration_from_days",
        serialize_with = "serialize_duration_to_days"
    )]
    pub dedup_window: Duration,

    /// No two posts hit the same target inside this window, whatever the job.
    #[serde(
        rename = "cooldown_hours",
        default = "default_cooldown",
        deserialize_with = "deserialize_duration_from_hours",
        serialize_with = "serialize_duration_to_hours"
    )]
    pub cooldown: Duration,

    /// Default retention horizon for `cleanup`.
    #[serde(
        rename = "retention_days",
        default = "default_post_retention",
        deserialize_with = "deserialize_duration_from_days",
        serialize_with = "serialize_duration_to_days"
    )]
    pub retention: Duration,
}

impl Default for PostHistoryConfig {
    fn default() -> Self {
        Self {
            dedup_window: default_dedup_window(),
            cooldown: default_cooldown(),
            retention: default_post_retention(),
        }
    }
}

impl PostHistoryConfig {
    /// Checks that every window stays within [`MAX_WINDOW_DAYS`].
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check_window("post_history.dedup_window_days", self.dedup_window)?;
        check_window("post_history.cooldown_hours", self.cooldown)?;
        check_window("post_history.retention_days", self.retention)
    }
}

/// The transport used to deliver alert emails.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MailerConfig {
    /// Print rendered emails to standard output.
    #[default]
    Stdout,

    /// POST rendered emails as JSON to an HTTP mail relay.
    Webhook {
        /// The relay endpoint.
        url: Url,
        /// Optional bearer token sent in the `Authorization` header.
        #[serde(default)]
        token: Option<String>,
        /// Retry policy for transient relay errors.
        #[serde(default)]
        retry_policy: HttpRetryConfig,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_per_window, 1);
        assert_eq!(config.window, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_rejects_zero_ceiling() {
        let config = RateLimitConfig { max_per_window: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigValidationError::InvalidRateLimitCeiling(0)));
    }

    #[test]
    fn test_rate_limit_rejects_zero_window() {
        let config = RateLimitConfig { window: Duration::ZERO, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigValidationError::EmptyRateLimitWindow));
    }

    #[test]
    fn test_notification_config_rejects_bad_base_url() {
        let config =
            NotificationConfig { base_url: "not a url".to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_post_history_defaults() {
        let config = PostHistoryConfig::default();
        assert_eq!(config.dedup_window, days(7));
        assert_eq!(config.cooldown, hours(72));
        assert_eq!(config.retention, days(30));
    }

    #[test]
    fn test_windows_longer_than_bound_are_rejected() {
        let rate = RateLimitConfig { window: days(MAX_WINDOW_DAYS + 1), ..Default::default() };
        assert_eq!(
            rate.validate(),
            Err(ConfigValidationError::WindowTooLong { name: "window_secs" })
        );

        let notifications =
            NotificationConfig { retention: days(MAX_WINDOW_DAYS + 1), ..Default::default() };
        assert_eq!(
            notifications.validate(),
            Err(ConfigValidationError::WindowTooLong { name: "notifications.retention_days" })
        );

        let posts = PostHistoryConfig { dedup_window: days(200_000_000), ..Default::default() };
        assert_eq!(
            posts.validate(),
            Err(ConfigValidationError::WindowTooLong { name: "post_history.dedup_window_days" })
        );

        let posts = PostHistoryConfig { cooldown: Duration::MAX, ..Default::default() };
        assert!(posts.validate().is_err());
    }

    #[test]
    fn test_window_at_bound_is_accepted() {
        let config = PostHistoryConfig {
            dedup_window: days(MAX_WINDOW_DAYS),
            cooldown: days(MAX_WINDOW_DAYS),
            retention: days(MAX_WINDOW_DAYS),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mailer_config_webhook_from_json() {
        let json = r#"{"kind": "webhook", "url": "https://relay.example.com/send"}"#;
        let config: MailerConfig = serde_json::from_str(json).unwrap();
        match config {
            MailerConfig::Webhook { url, token, retry_policy } => {
                assert_eq!(url.as_str(), "https://relay.example.com/send");
                assert!(token.is_none());
                assert_eq!(retry_policy, HttpRetryConfig::default());
            }
            MailerConfig::Stdout => panic!("Expected webhook mailer config"),
        }
    }
}
