//! Ledger records and per-job dispatch reports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof that an alert has been notified about a job. At most one exists per
/// `(alert_id, job_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRecord {
    /// The alert that was notified.
    pub alert_id: i64,
    /// The job it was notified about.
    pub job_id: String,
    /// When the reservation was taken.
    pub sent_at: DateTime<Utc>,
}

/// What happened to one matching alert during a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The email was delivered and the ledger record is permanent.
    Sent,
    /// The pair had already been notified or another worker holds it.
    SkippedDuplicate,
    /// The owner reached the rate limit ceiling; nothing was kept.
    SkippedRateLimited,
    /// Delivery or storage failed; the pair may be retried.
    Failed {
        /// Human readable cause.
        reason: String,
    },
}

impl DispatchOutcome {
    /// Returns true for outcomes that indicate something is broken, as
    /// opposed to suppression that is working as intended.
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed { .. })
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Sent => write!(f, "sent"),
            DispatchOutcome::SkippedDuplicate => write!(f, "skipped-duplicate"),
            DispatchOutcome::SkippedRateLimited => write!(f, "skipped-rate-limited"),
            DispatchOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// The outcome for a single alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertOutcome {
    /// The alert that matched.
    pub alert_id: i64,
    /// The alert owner.
    pub recipient: String,
    /// What the dispatcher did.
    pub outcome: DispatchOutcome,
}

/// Aggregated per-alert outcomes for one job. Alerts that did not match are
/// not listed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchReport {
    /// The job that was dispatched.
    pub job_id: String,
    /// One entry per matching alert, in evaluation order.
    pub outcomes: Vec<AlertOutcome>,
}

impl DispatchReport {
    /// Creates an empty report for a job.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self { job_id: job_id.into(), outcomes: Vec::new() }
    }

    /// Appends an outcome.
    pub fn push(&mut self, alert_id: i64, recipient: &str, outcome: DispatchOutcome) {
        self.outcomes.push(AlertOutcome { alert_id, recipient: recipient.to_string(), outcome });
    }

    /// Returns the outcome recorded for an alert, if it matched.
    pub fn outcome_for(&self, alert_id: i64) -> Option<&DispatchOutcome> {
        self.outcomes.iter().find(|o| o.alert_id == alert_id).map(|o| &o.outcome)
    }

    /// Number of alerts that matched the job.
    pub fn matched(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of emails delivered.
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Sent))
    }

    /// Number of alerts skipped because the pair was already notified.
    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::SkippedDuplicate))
    }

    /// Number of alerts skipped because of the recipient rate limit.
    pub fn rate_limited(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::SkippedRateLimited))
    }

    /// Number of alerts that failed.
    pub fn failed(&self) -> usize {
        self.count(DispatchOutcome::is_failure)
    }

    fn count(&self, predicate: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.outcome)).count()
    }
}
