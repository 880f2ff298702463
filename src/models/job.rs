//! The job posting value consumed by the match engine.

use serde::{Deserialize, Serialize};

/// A job posting as delivered by the job feed. Treated as immutable while it
/// is being matched and dispatched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Identifier assigned by the job feed.
    pub id: String,
    /// Job title.
    pub title: String,
    /// Hiring company.
    pub company: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Location as written by the poster.
    #[serde(default)]
    pub location: String,
    /// Technologies listed on the posting.
    #[serde(default)]
    pub technologies: Vec<String>,
    /// Whether the position is remote.
    #[serde(default)]
    pub remote: bool,
}

impl Job {
    /// Builds the lowercase text that alert keywords are searched in: title,
    /// description, company and tags.
    pub fn haystack(&self) -> String {
        let mut haystack = String::with_capacity(
            self.title.len() + self.description.len() + self.company.len() + 16 * self.tags.len(),
        );
        haystack.push_str(&self.title);
        haystack.push(' ');
        haystack.push_str(&self.description);
        haystack.push(' ');
        haystack.push_str(&self.company);
        for tag in &self.tags {
            haystack.push(' ');
            haystack.push_str(tag);
        }
        haystack.to_lowercase()
    }
}
