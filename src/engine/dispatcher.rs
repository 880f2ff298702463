//! Delivers alert emails for newly ingested jobs.
//!
//! For every active alert that matches a job the dispatcher:
//!
//! 1. reserves the `(alert, job)` pair in the [`NotificationLedger`] with an
//!    atomic insert-if-absent, so concurrent or repeated dispatches of the same
//!    job cannot both proceed;
//! 2. takes a rate limit slot for the owner, releasing the reservation when the
//!    owner is at the ceiling;
//! 3. renders and sends the email under a bounded timeout, releasing the
//!    reservation and refunding the slot when delivery fails.
//!
//! A reservation that survives a successful send is the permanent record.
//! Failed deliveries are logged to the ledger's failure table for `stats`.
//! No in-process lock is held; all coordination goes through the stores.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use super::{matcher::MatchEngine, rate_limiter::RateLimiter, to_delta, window_start};
use crate::{
    config::{ConfigValidationError, NotificationConfig},
    mailer::{Mailer, MailerError, MessageRenderer, TemplateError},
    models::{Alert, CleanupSummary, DispatchOutcome, DispatchReport, Job, RateLimitStats},
    persistence::{AlertStore, NotificationLedger, PersistenceError},
};

/// Errors raised by the dispatcher.
///
/// Only failures that prevent a dispatch from starting surface as errors;
/// per-alert problems are reported as [`DispatchOutcome::Failed`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A backing store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The email could not be rendered.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// The mailer failed or timed out.
    #[error("Delivery error: {0}")]
    Delivery(#[from] MailerError),

    /// The dispatcher was configured with unusable values.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),
}

/// Orchestrates matching, deduplication, throttling and delivery.
pub struct NotificationDispatcher {
    alerts: Arc<dyn AlertStore>,
    ledger: Arc<dyn NotificationLedger>,
    rate_limiter: RateLimiter,
    mailer: Arc<dyn Mailer>,
    renderer: MessageRenderer,
    mailer_timeout: Duration,
    retention: TimeDelta,
}

impl NotificationDispatcher {
    /// Creates a dispatcher. Fails when the notification settings are invalid
    /// or a template does not compile.
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        ledger: Arc<dyn NotificationLedger>,
        rate_limiter: RateLimiter,
        mailer: Arc<dyn Mailer>,
        config: &NotificationConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let renderer = MessageRenderer::new(config)?;

        Ok(Self {
            alerts,
            ledger,
            rate_limiter,
            mailer,
            renderer,
            mailer_timeout: config.mailer_timeout,
            retention: to_delta(config.retention),
        })
    }

    /// Dispatches a job to every matching active alert.
    pub async fn dispatch(&self, job: &Job) -> Result<DispatchReport, DispatchError> {
        self.dispatch_at(job, Utc::now()).await
    }

    /// Dispatches a job as of `now`.
    ///
    /// Fails only when the active alerts cannot be loaded. Every other problem
    /// is isolated to the alert it concerns.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn dispatch_at(
        &self,
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, DispatchError> {
        let alerts = self.alerts.list_active().await?;
        let haystack = job.haystack();
        let mut report = DispatchReport::new(&job.id);

        for alert in &alerts {
            let compiled = MatchEngine::compile(alert);
            if !compiled.matches_haystack(job, &haystack) {
                continue;
            }

            let matched_keywords = compiled.matched_keywords(&haystack);
            let outcome = self.notify(alert, &matched_keywords, job, now).await;
            report.push(alert.id, &alert.email, outcome);
        }

        tracing::info!(
            active_alerts = alerts.len(),
            matched = report.matched(),
            sent = report.sent(),
            duplicates = report.duplicates(),
            rate_limited = report.rate_limited(),
            failed = report.failed(),
            "Dispatched job."
        );
        Ok(report)
    }

    async fn notify(
        &self,
        alert: &Alert,
        matched_keywords: &[String],
        job: &Job,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        match self.ledger.reserve(alert.id, &job.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(alert_id = alert.id, "Pair already notified, skipping.");
                return DispatchOutcome::SkippedDuplicate;
            }
            Err(e) => {
                tracing::error!(alert_id = alert.id, error = %e, "Failed to reserve notification.");
                return self.failed(alert, job, now, e.to_string()).await;
            }
        }

        match self.send_reserved(alert, matched_keywords, job, now).await {
            Ok(DispatchOutcome::Sent) => {
                tracing::info!(alert_id = alert.id, recipient = %alert.email, "Alert email sent.");
                DispatchOutcome::Sent
            }
            Ok(outcome) => match self.release(alert, job).await {
                Ok(()) => outcome,
                Err(e) => self.failed(alert, job, now, e.to_string()).await,
            },
            Err(e) => {
                tracing::warn!(alert_id = alert.id, error = %e, "Alert delivery failed.");
                let reason = match self.release(alert, job).await {
                    Ok(()) => e.to_string(),
                    Err(release_err) => format!("{e}; {release_err}"),
                };
                self.failed(alert, job, now, reason).await
            }
        }
    }

    /// Logs the failure to the ledger and builds the outcome. A failure to
    /// log is reported but does not change the outcome.
    async fn failed(
        &self,
        alert: &Alert,
        job: &Job,
        now: DateTime<Utc>,
        reason: String,
    ) -> DispatchOutcome {
        if let Err(e) = self.ledger.record_failure(alert.id, &job.id, &reason, now).await {
            tracing::error!(alert_id = alert.id, error = %e, "Failed to record delivery failure.");
        }
        DispatchOutcome::Failed { reason }
    }

    /// Runs the throttled send for a pair that is already reserved. Returns
    /// `SkippedRateLimited` or `Sent`; the caller owns the reservation.
    async fn send_reserved(
        &self,
        alert: &Alert,
        matched_keywords: &[String],
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(permit) = self.rate_limiter.try_acquire_at(&alert.email, now).await? else {
            tracing::debug!(
                alert_id = alert.id,
                recipient = %alert.email,
                "Recipient at rate limit ceiling."
            );
            return Ok(DispatchOutcome::SkippedRateLimited);
        };

        if let Err(e) = self.deliver(alert, matched_keywords, job).await {
            if let Err(refund_err) = self.rate_limiter.refund(&permit).await {
                tracing::error!(
                    slot_id = permit.slot_id,
                    error = %refund_err,
                    "Failed to refund rate limit slot."
                );
            }
            return Err(e);
        }

        Ok(DispatchOutcome::Sent)
    }

    async fn deliver(
        &self,
        alert: &Alert,
        matched_keywords: &[String],
        job: &Job,
    ) -> Result<(), DispatchError> {
        let message = self.renderer.render(alert, job, matched_keywords)?;
        match tokio::time::timeout(self.mailer_timeout, self.mailer.send(&message)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(MailerError::Timeout(self.mailer_timeout).into()),
        }
    }

    async fn release(&self, alert: &Alert, job: &Job) -> Result<(), PersistenceError> {
        self.ledger.release(alert.id, &job.id).await.inspect_err(|e| {
            tracing::error!(
                alert_id = alert.id,
                error = %e,
                "Failed to release notification reservation."
            );
        })
    }

    /// Current throttling statistics.
    pub async fn stats(&self) -> Result<RateLimitStats, DispatchError> {
        self.stats_at(Utc::now()).await
    }

    /// Throttling statistics as of `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<RateLimitStats, DispatchError> {
        let alerts = self.alerts.list_active().await?;
        Ok(self.rate_limiter.stats_at(&alerts, self.ledger.as_ref(), now).await?)
    }

    /// Purges ledger records and delivery failures past the retention horizon,
    /// and expired rate limit slots.
    pub async fn cleanup(&self) -> Result<CleanupSummary, DispatchError> {
        self.cleanup_at(Utc::now()).await
    }

    /// Purges as of `now`.
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupSummary, DispatchError> {
        let cutoff = window_start(now, self.retention);
        let notification_records = self.ledger.purge_before(cutoff).await?;
        let delivery_failures = self.ledger.purge_failures_before(cutoff).await?;
        let rate_limit_slots = self.rate_limiter.purge_expired_at(now).await?;

        tracing::info!(
            notification_records,
            delivery_failures,
            rate_limit_slots,
            "Notification cleanup finished."
        );
        Ok(CleanupSummary { notification_records, delivery_failures, rate_limit_slots })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};

    use super::*;
    use crate::{
        config::RateLimitConfig,
        mailer::{MailMessage, MockMailer},
        persistence::traits::{MockAlertStore, MockNotificationLedger, MockRateLimitStore},
        test_helpers::{AlertBuilder, JobBuilder},
    };

    struct Mocks {
        alerts: MockAlertStore,
        ledger: MockNotificationLedger,
        rate_store: MockRateLimitStore,
        mailer: MockMailer,
    }

    impl Mocks {
        fn new(alerts: Vec<Alert>) -> Self {
            let mut store = MockAlertStore::new();
            store.expect_list_active().returning(move || Ok(alerts.clone()));
            Self {
                alerts: store,
                ledger: MockNotificationLedger::new(),
                rate_store: MockRateLimitStore::new(),
                mailer: MockMailer::new(),
            }
        }

        fn build(self) -> NotificationDispatcher {
            let limiter =
                RateLimiter::new(Arc::new(self.rate_store), RateLimitConfig::default()).unwrap();
            NotificationDispatcher::new(
                Arc::new(self.alerts),
                Arc::new(self.ledger),
                limiter,
                Arc::new(self.mailer),
                &NotificationConfig::default(),
            )
            .unwrap()
        }
    }

    fn rust_alert(id: i64) -> Alert {
        AlertBuilder::new(id).email("dev@example.com").keywords(&["rust"]).build()
    }

    fn rust_job() -> Job {
        JobBuilder::new("job-1").title("Rust Engineer").company("Acme").build()
    }

    #[tokio::test]
    async fn test_non_matching_alerts_have_no_side_effects() {
        let alert = AlertBuilder::new(1).keywords(&["golang"]).build();
        let dispatcher = Mocks::new(vec![alert]).build();

        let report = dispatcher.dispatch(&rust_job()).await.unwrap();
        assert_eq!(report.matched(), 0);
    }

    #[tokio::test]
    async fn test_sends_and_keeps_reservation() {
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks
            .ledger
            .expect_reserve()
            .with(eq(1), eq("job-1"), always())
            .times(1)
            .returning(|_, _, _| Ok(true));
        mocks.ledger.expect_release().never();
        mocks.rate_store.expect_try_increment().times(1).returning(|_, _, _, _| Ok(Some(5)));
        mocks.rate_store.expect_remove().never();
        mocks
            .mailer
            .expect_send()
            .withf(|message: &MailMessage| {
                message.to == "dev@example.com" && message.subject.contains("Rust Engineer")
            })
            .times(1)
            .returning(|_| Ok(()));

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        assert_eq!(report.outcome_for(1), Some(&DispatchOutcome::Sent));
    }

    #[tokio::test]
    async fn test_existing_reservation_is_duplicate() {
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks.ledger.expect_reserve().returning(|_, _, _| Ok(false));
        mocks.mailer.expect_send().never();

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        assert_eq!(report.outcome_for(1), Some(&DispatchOutcome::SkippedDuplicate));
    }

    #[tokio::test]
    async fn test_rate_limited_alert_releases_reservation() {
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks.ledger.expect_reserve().returning(|_, _, _| Ok(true));
        mocks.ledger.expect_release().with(eq(1), eq("job-1")).times(1).returning(|_, _| Ok(()));
        mocks.rate_store.expect_try_increment().returning(|_, _, _, _| Ok(None));
        mocks.mailer.expect_send().never();

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        assert_eq!(report.outcome_for(1), Some(&DispatchOutcome::SkippedRateLimited));
    }

    #[tokio::test]
    async fn test_delivery_failure_releases_and_refunds() {
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks.ledger.expect_reserve().returning(|_, _, _| Ok(true));
        mocks.ledger.expect_release().times(1).returning(|_, _| Ok(()));
        mocks.rate_store.expect_try_increment().returning(|_, _, _, _| Ok(Some(9)));
        mocks.rate_store.expect_remove().with(eq(9)).times(1).returning(|_| Ok(()));
        mocks
            .mailer
            .expect_send()
            .returning(|_| Err(MailerError::Rejected("mailbox full".to_string())));
        mocks
            .ledger
            .expect_record_failure()
            .withf(|alert_id, job_id, reason, _| {
                *alert_id == 1 && job_id == "job-1" && reason.contains("mailbox full")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        match report.outcome_for(1) {
            Some(DispatchOutcome::Failed { reason }) => assert!(reason.contains("mailbox full")),
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_release_is_reported_as_failure() {
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks.ledger.expect_reserve().returning(|_, _, _| Ok(true));
        mocks
            .ledger
            .expect_release()
            .returning(|_, _| Err(PersistenceError::OperationFailed("db down".to_string())));
        mocks.rate_store.expect_try_increment().returning(|_, _, _, _| Ok(None));
        mocks.ledger.expect_record_failure().times(1).returning(|_, _, _, _| Ok(()));

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        assert!(report.outcome_for(1).is_some_and(DispatchOutcome::is_failure));
    }

    #[tokio::test]
    async fn test_store_failure_is_isolated_per_alert() {
        let mut mocks = Mocks::new(vec![rust_alert(1), rust_alert(2)]);
        mocks
            .ledger
            .expect_reserve()
            .with(eq(1), always(), always())
            .returning(|_, _, _| Err(PersistenceError::OperationFailed("locked".to_string())));
        mocks.ledger.expect_reserve().with(eq(2), always(), always()).returning(|_, _, _| Ok(true));
        mocks
            .ledger
            .expect_record_failure()
            .with(eq(1), eq("job-1"), always(), always())
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mocks.rate_store.expect_try_increment().times(1).returning(|_, _, _, _| Ok(Some(1)));
        mocks.mailer.expect_send().times(1).returning(|_| Ok(()));

        let report = mocks.build().dispatch(&rust_job()).await.unwrap();
        assert!(report.outcome_for(1).is_some_and(DispatchOutcome::is_failure));
        assert_eq!(report.outcome_for(2), Some(&DispatchOutcome::Sent));
    }

    #[tokio::test]
    async fn test_alert_store_failure_aborts_dispatch() {
        let mut alerts = MockAlertStore::new();
        alerts
            .expect_list_active()
            .returning(|| Err(PersistenceError::OperationFailed("db down".to_string())));
        let mocks = Mocks {
            alerts,
            ledger: MockNotificationLedger::new(),
            rate_store: MockRateLimitStore::new(),
            mailer: MockMailer::new(),
        };

        let result = mocks.build().dispatch(&rust_job()).await;
        assert!(matches!(result, Err(DispatchError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_cleanup_uses_retention_and_window() {
        let now = Utc::now();
        let mut mocks = Mocks::new(vec![]);
        mocks
            .ledger
            .expect_purge_before()
            .with(eq(now - TimeDelta::days(30)))
            .times(1)
            .returning(|_| Ok(4));
        mocks
            .ledger
            .expect_purge_failures_before()
            .with(eq(now - TimeDelta::days(30)))
            .times(1)
            .returning(|_| Ok(3));
        mocks
            .rate_store
            .expect_purge_before()
            .with(eq(now - TimeDelta::hours(1)))
            .times(1)
            .returning(|_| Ok(2));

        let summary = mocks.build().cleanup_at(now).await.unwrap();
        assert_eq!(
            summary,
            CleanupSummary { notification_records: 4, delivery_failures: 3, rate_limit_slots: 2 }
        );
    }

    #[tokio::test]
    async fn test_unrecorded_failure_keeps_outcome() {
        let now = Utc::now();
        let mut mocks = Mocks::new(vec![rust_alert(1)]);
        mocks.ledger.expect_reserve().returning(|_, _, _| Ok(true));
        mocks.ledger.expect_release().times(1).returning(|_, _| Ok(()));
        mocks.rate_store.expect_try_increment().returning(|_, _, _, _| Ok(Some(2)));
        mocks.rate_store.expect_remove().returning(|_| Ok(()));
        mocks.mailer.expect_send().returning(|_| Err(MailerError::Timeout(Duration::ZERO)));
        mocks
            .ledger
            .expect_record_failure()
            .with(eq(1), eq("job-1"), always(), eq(now))
            .times(1)
            .returning(|_, _, _, _| Err(PersistenceError::OperationFailed("locked".to_string())));

        let report = mocks.build().dispatch_at(&rust_job(), now).await.unwrap();
        assert!(report.outcome_for(1).is_some_and(DispatchOutcome::is_failure));
    }

    #[tokio::test]
    async fn test_cleanup_with_oversized_retention_purges_nothing_recent() {
        let now = Utc::now();
        let mut mocks = Mocks::new(vec![]);
        mocks
            .ledger
            .expect_purge_before()
            .with(eq(DateTime::<Utc>::MIN_UTC))
            .times(1)
            .returning(|_| Ok(0));
        mocks
            .ledger
            .expect_purge_failures_before()
            .with(eq(DateTime::<Utc>::MIN_UTC))
            .times(1)
            .returning(|_| Ok(0));
        mocks.rate_store.expect_purge_before().returning(|_| Ok(0));

        let mut dispatcher = mocks.build();
        dispatcher.retention = TimeDelta::MAX;
        let summary = dispatcher.cleanup_at(now).await.unwrap();
        assert_eq!(summary, CleanupSummary::default());
    }

    #[test]
    fn test_new_rejects_zero_timeout() {
        let mocks = Mocks::new(vec![]);
        let limiter =
            RateLimiter::new(Arc::new(mocks.rate_store), RateLimitConfig::default()).unwrap();
        let config = NotificationConfig { mailer_timeout: Duration::ZERO, ..Default::default() };

        let result = NotificationDispatcher::new(
            Arc::new(mocks.alerts),
            Arc::new(mocks.ledger),
            limiter,
            Arc::new(mocks.mailer),
            &config,
        );
        assert!(matches!(result, Err(DispatchError::Config(_))));
    }
}
