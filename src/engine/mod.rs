//! The dispatch engine: alert matching, per-recipient throttling, email
//! dispatch with at-most-once delivery, and social post history.

pub mod dispatcher;
pub mod matcher;
pub mod post_history;
pub mod rate_limiter;

use chrono::{DateTime, TimeDelta, Utc};

pub use dispatcher::{DispatchError, NotificationDispatcher};
pub use matcher::{CompiledAlert, MatchEngine};
pub use post_history::PostHistoryTracker;
pub use rate_limiter::{RateLimitPermit, RateLimiter};

/// Start of the window of length `span` that ends at `now`. A window reaching
/// past the earliest representable instant starts there, so it covers every
/// record.
pub(crate) fn window_start(now: DateTime<Utc>, span: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Converts a configured duration, saturating at the largest `TimeDelta`.
pub(crate) fn to_delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_clamps_to_earliest_instant() {
        let now = Utc::now();
        assert_eq!(window_start(now, TimeDelta::hours(1)), now - TimeDelta::hours(1));
        assert_eq!(window_start(now, TimeDelta::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            window_start(now, to_delta(std::time::Duration::MAX)),
            DateTime::<Utc>::MIN_UTC
        );
    }
}
