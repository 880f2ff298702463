use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de::Error};

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Custom deserializer for Duration from milliseconds
pub fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

/// Custom deserializer for Duration from seconds
pub fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Custom deserializer for Duration from hours
pub fn deserialize_duration_from_hours<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let hours = u64::deserialize(deserializer)?;
    let secs = hours
        .checked_mul(SECS_PER_HOUR)
        .ok_or_else(|| D::Error::custom(format!("{hours} hours overflows a duration")))?;
    Ok(Duration::from_secs(secs))
}

/// Custom deserializer for Duration from days
pub fn deserialize_duration_from_days<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let days = u64::deserialize(deserializer)?;
    let secs = days
        .checked_mul(SECS_PER_DAY)
        .ok_or_else(|| D::Error::custom(format!("{days} days overflows a duration")))?;
    Ok(Duration::from_secs(secs))
}

/// Custom serializer for Duration to milliseconds
pub fn serialize_duration_to_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Custom serializer for Duration to seconds
pub fn serialize_duration_to_seconds<S>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

/// Custom serializer for Duration to whole hours
pub fn serialize_duration_to_hours<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs() / SECS_PER_HOUR)
}

/// Custom serializer for Duration to whole days
pub fn serialize_duration_to_days<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs() / SECS_PER_DAY)
}

/// Converts a number of days into a `Duration`, saturating on overflow.
pub fn days(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(SECS_PER_DAY))
}

/// Converts a number of hours into a `Duration`, saturating on overflow.
pub fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(SECS_PER_HOUR))
}
