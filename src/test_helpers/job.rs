//! A builder for creating `Job` instances in tests.

use super::alert::to_strings;
use crate::models::Job;

/// A builder for creating `Job` instances in tests.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    /// Creates a builder for a job with the given identifier and placeholder
    /// title and company.
    pub fn new(id: &str) -> Self {
        Self {
            job: Job {
                id: id.to_string(),
                title: "Software Engineer".to_string(),
                company: "Example Corp".to_string(),
                ..Default::default()
            },
        }
    }

    /// Sets the title.
    pub fn title(mut self, title: &str) -> Self {
        self.job.title = title.to_string();
        self
    }

    /// Sets the company.
    pub fn company(mut self, company: &str) -> Self {
        self.job.company = company.to_string();
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: &str) -> Self {
        self.job.description = description.to_string();
        self
    }

    /// Sets the tags.
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.job.tags = to_strings(tags);
        self
    }

    /// Sets the location.
    pub fn location(mut self, location: &str) -> Self {
        self.job.location = location.to_string();
        self
    }

    /// Sets the technologies.
    pub fn technologies(mut self, technologies: &[&str]) -> Self {
        self.job.technologies = to_strings(technologies);
        self
    }

    /// Sets the remote flag.
    pub fn remote(mut self, remote: bool) -> Self {
        self.job.remote = remote;
        self
    }

    /// Builds the `Job` instance.
    pub fn build(self) -> Job {
        self.job
    }
}
