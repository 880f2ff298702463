//! Alert definitions owned by subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A saved search that emails its owner when a matching job is ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// Unique identifier assigned by the alert store.
    pub id: i64,
    /// Address the alert emails are sent to.
    pub email: String,
    /// Lowercase keywords; at least one must occur in the job text.
    pub keywords: Vec<String>,
    /// Lowercase technologies; when non-empty at least one must be listed on
    /// the job.
    #[serde(default)]
    pub technologies: Vec<String>,
    /// Lowercase location substrings; when non-empty at least one must occur
    /// in the job location.
    #[serde(default)]
    pub locations: Vec<String>,
    /// Inactive alerts are never loaded for dispatch.
    pub active: bool,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

/// Errors raised when an alert definition cannot be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlertValidationError {
    /// An alert without keywords would never match anything.
    #[error("Alert must have at least one non-empty keyword")]
    EmptyKeywords,

    /// The owner address is not usable as an email recipient.
    #[error("Invalid owner email address: '{0}'")]
    InvalidEmail(String),
}

/// An alert as submitted for creation, before the store assigns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAlert {
    /// Address the alert emails are sent to.
    pub email: String,
    /// Keywords, matched case-insensitively.
    pub keywords: Vec<String>,
    /// Optional technology filter.
    #[serde(default)]
    pub technologies: Vec<String>,
    /// Optional location filter.
    #[serde(default)]
    pub locations: Vec<String>,
}

impl NewAlert {
    /// Normalizes the definition and rejects one that could never match.
    ///
    /// Terms are trimmed, lowercased and deduplicated; blank terms are
    /// dropped before the keyword check so `["  "]` counts as empty.
    pub fn validate(self) -> Result<Self, AlertValidationError> {
        let email = self.email.trim().to_string();
        if !is_plausible_email(&email) {
            return Err(AlertValidationError::InvalidEmail(self.email));
        }

        let keywords = normalize_terms(self.keywords);
        if keywords.is_empty() {
            return Err(AlertValidationError::EmptyKeywords);
        }

        Ok(Self {
            email,
            keywords,
            technologies: normalize_terms(self.technologies),
            locations: normalize_terms(self.locations),
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) =>
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
        None => false,
    }
}

fn normalize_terms(terms: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !normalized.contains(&term) {
            normalized.push(term);
        }
    }
    normalized
}
