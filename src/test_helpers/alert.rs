//! A builder for creating `Alert` instances in tests.

use chrono::{DateTime, Utc};

use crate::models::Alert;

/// A builder for creating `Alert` instances in tests.
///
/// Terms are stored as given; use [`crate::models::NewAlert::validate`] when a
/// test needs the normalized form.
pub struct AlertBuilder {
    id: i64,
    email: Option<String>,
    keywords: Vec<String>,
    technologies: Vec<String>,
    locations: Vec<String>,
    active: bool,
    created_at: Option<DateTime<Utc>>,
}

impl AlertBuilder {
    /// Creates a builder for an active alert matching `rust`.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            email: None,
            keywords: vec!["rust".to_string()],
            technologies: Vec::new(),
            locations: Vec::new(),
            active: true,
            created_at: None,
        }
    }

    /// Sets the owner address. Defaults to `alert{id}@example.com`.
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Sets the keywords.
    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = to_strings(keywords);
        self
    }

    /// Sets the technology filter.
    pub fn technologies(mut self, technologies: &[&str]) -> Self {
        self.technologies = to_strings(technologies);
        self
    }

    /// Sets the location filter.
    pub fn locations(mut self, locations: &[&str]) -> Self {
        self.locations = to_strings(locations);
        self
    }

    /// Sets the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the `Alert` instance.
    pub fn build(self) -> Alert {
        Alert {
            id: self.id,
            email: self.email.unwrap_or_else(|| format!("alert{}@example.com", self.id)),
            keywords: self.keywords,
            technologies: self.technologies,
            locations: self.locations,
            active: self.active,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

pub(super) fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
