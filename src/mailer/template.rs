//! Renders alert emails from minijinja templates.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::json;
use thiserror::Error;
use url::Url;

use super::MailMessage;
use crate::{
    config::NotificationConfig,
    models::{Alert, Job},
};

/// Errors raised while preparing or rendering the email templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template failed to compile or render.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),

    /// The public base URL for job links is unusable.
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Renders the subject and body of alert emails.
///
/// The template context exposes `job` (the full posting), `alert` (id and
/// email), `matched_keywords` and `job_url`. Undefined variables are errors.
pub struct MessageRenderer {
    env: Environment<'static>,
    subject_template: String,
    body_template: String,
    base_url: Url,
}

impl MessageRenderer {
    /// Creates a renderer, compiling both templates once up front so a typo
    /// surfaces at startup instead of on the first match.
    pub fn new(config: &NotificationConfig) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.template_from_str(&config.subject_template)?;
        env.template_from_str(&config.body_template)?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| TemplateError::InvalidBaseUrl(config.base_url.clone()))?;

        Ok(Self {
            env,
            subject_template: config.subject_template.clone(),
            body_template: config.body_template.clone(),
            base_url,
        })
    }

    /// Public link to the job posting: `{base_url}/jobs/{job_id}`.
    pub fn job_url(&self, job: &Job) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("jobs").push(&job.id);
        }
        url.to_string()
    }

    /// Renders the email for one matched alert.
    pub fn render(
        &self,
        alert: &Alert,
        job: &Job,
        matched_keywords: &[String],
    ) -> Result<MailMessage, TemplateError> {
        let context = json!({
            "job": job,
            "alert": { "id": alert.id, "email": alert.email },
            "matched_keywords": matched_keywords,
            "job_url": self.job_url(job),
        });

        let subject = self.render_str(&self.subject_template, &context)?;
        let body = self.render_str(&self.body_template, &context)?;

        Ok(MailMessage { to: alert.email.clone(), subject: subject.trim().to_string(), body })
    }

    fn render_str(
        &self,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String, TemplateError> {
        self.env.render_str(template, context).map_err(|e| {
            tracing::warn!(error = %e, "Failed to render alert email template.");
            TemplateError::RenderError(e)
        })
    }
}
