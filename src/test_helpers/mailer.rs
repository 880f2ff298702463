//! An in-memory mailer for tests.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::mailer::{MailMessage, Mailer, MailerError};

/// A mailer that records delivered messages and can be told to fail or to
/// stall.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    per_recipient: DashMap<String, usize>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    always_fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingMailer {
    /// Creates a mailer that accepts every message immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mailer that waits `delay` before accepting each message.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Makes every send fail until switched off.
    pub fn set_always_fail(&self, always_fail: bool) {
        self.always_fail.store(always_fail, Ordering::SeqCst);
    }

    /// Messages delivered so far.
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of messages delivered so far.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Number of messages delivered to a recipient.
    pub fn count_for(&self, recipient: &str) -> usize {
        self.per_recipient.get(recipient).map(|count| *count).unwrap_or(0)
    }

    /// Number of send calls, delivered or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(MailerError::Rejected("recording mailer set to fail".to_string()));
        }
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MailerError::Rejected("recording mailer set to fail".to_string()));
        }

        *self.per_recipient.entry(message.to.clone()).or_insert(0) += 1;
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
