use async_trait::async_trait;

use super::{MailMessage, Mailer, MailerError};

/// A mailer that prints every message to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutMailer;

#[async_trait]
impl Mailer for StdoutMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailerError> {
        println!(
            "=== Alert email to {} ===\nSubject: {}\n\n{}\n",
            message.to, message.subject, message.body
        );
        Ok(())
    }
}
