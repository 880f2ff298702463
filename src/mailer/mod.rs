//! # Mailer
//!
//! The outbound email seam. The dispatcher only depends on the [`Mailer`]
//! trait; concrete transports live next to it:
//!
//! - [`StdoutMailer`] prints rendered messages, useful for local runs.
//! - [`WebhookMailer`] POSTs rendered messages to an HTTP mail relay.
//!
//! Messages are rendered by [`MessageRenderer`] from minijinja templates.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::MailerConfig, http_client::HttpClientError};

mod stdout;
mod template;
mod webhook;

pub use stdout::StdoutMailer;
pub use template::{MessageRenderer, TemplateError};
pub use webhook::WebhookMailer;

/// A rendered alert email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

/// Errors reported by a mail transport. Every variant is a delivery failure
/// from the dispatcher's point of view.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The transport refused the message.
    #[error("Mail delivery rejected: {0}")]
    Rejected(String),

    /// The transport did not answer in time.
    #[error("Mail delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP request to the relay failed.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),

    /// The HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] HttpClientError),
}

/// Delivers rendered emails. Implementations may be retried by the
/// dispatcher and must not rely on deduplicating on their side.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one message.
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError>;
}

/// Creates the mailer selected by the configuration.
pub fn create_mailer(config: &MailerConfig) -> Result<Arc<dyn Mailer>, MailerError> {
    Ok(match config {
        MailerConfig::Stdout => Arc::new(StdoutMailer),
        MailerConfig::Webhook { url, token, retry_policy } =>
            Arc::new(WebhookMailer::new(url.clone(), token.clone(), retry_policy)?),
    })
}
