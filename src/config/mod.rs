//! Configuration module for the job alert service.

mod app_config;
mod helpers;
mod http_retry;
mod sections;

pub use app_config::AppConfig;
pub use helpers::{
    days, deserialize_duration_from_days, deserialize_duration_from_hours,
    deserialize_duration_from_ms, deserialize_duration_from_seconds, hours,
    serialize_duration_to_days, serialize_duration_to_hours, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use sections::{
    ConfigValidationError, MAX_WINDOW_DAYS, MailerConfig, NotificationConfig, PostHistoryConfig,
    RateLimitConfig,
};
