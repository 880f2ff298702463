//! Delivery through an HTTP mail relay.
//!
//! Each message is POSTed as `{"to", "subject", "body"}` JSON. Transient relay
//! errors are retried by the client middleware; any non-success status left
//! after retries is reported as a rejection.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use super::{MailMessage, Mailer, MailerError};
use crate::{config::HttpRetryConfig, http_client::build_http_client};

/// A mailer backed by an HTTP relay endpoint.
#[derive(Debug)]
pub struct WebhookMailer {
    url: Url,
    token: Option<String>,
    client: ClientWithMiddleware,
}

impl WebhookMailer {
    /// Creates a mailer for the given relay endpoint.
    pub fn new(
        url: Url,
        token: Option<String>,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Self, MailerError> {
        let client = build_http_client(retry_policy)?;
        Ok(Self { url, token, client })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    #[tracing::instrument(skip(self, message), fields(to = %message.to), level = "debug")]
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        let mut request = self.client.post(self.url.clone()).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailerError::Rejected(format!("Relay responded with status: {status}")));
        }

        tracing::debug!("Relay accepted message.");
        Ok(())
    }
}
