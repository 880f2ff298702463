//! Read-only operational views derived from the stores.

use serde::{Deserialize, Serialize};

/// Notification volume and throttling at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Number of active alerts.
    pub total_active_alerts: u64,
    /// Active alerts whose owner would be refused if a match occurred now.
    pub rate_limited_alerts: u64,
    /// Distinct recipients currently at or above the ceiling.
    pub rate_limited_recipients: u64,
    /// Ledger records written in the trailing 24 hours.
    pub emails_last_24h: u64,
    /// Failed delivery attempts in the trailing 24 hours.
    pub failed_last_24h: u64,
    /// Active alerts with at least one failed delivery in the trailing 24
    /// hours.
    pub failing_alerts: u64,
}

/// Post history volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostHistoryStats {
    /// All records currently retained.
    pub total: u64,
    /// Records posted in the trailing 7 days.
    pub last_7_days: u64,
    /// Records posted in the trailing 30 days.
    pub last_30_days: u64,
    /// Retained records per platform, sorted by platform.
    pub by_platform: Vec<(String, u64)>,
}

/// Rows removed by a maintenance pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Ledger records purged.
    pub notification_records: u64,
    /// Expired rate limit slots purged.
    pub rate_limit_slots: u64,
    /// Delivery failures purged.
    pub delivery_failures: u64,
}
