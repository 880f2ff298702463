//! Alert matching.
//!
//! An alert compiles into a [`CompiledAlert`] predicate made of three stages
//! that are ANDed together:
//!
//! 1. keywords (mandatory): at least one keyword occurs in the job's title,
//!    description, company or tags;
//! 2. technologies (optional): at least one alert technology is listed on the
//!    job;
//! 3. locations (optional): at least one location substring occurs in the job
//!    location.
//!
//! Each stage is an OR over its terms. An empty optional stage is skipped; an
//! empty keyword stage never matches.

use crate::models::{Alert, Job};

/// An alert predicate with every term lowercased up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAlert {
    keywords: Vec<String>,
    technologies: Vec<String>,
    locations: Vec<String>,
}

/// Compiles alerts into predicates and evaluates them against jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine;

impl MatchEngine {
    /// Compiles an alert. Blank terms are dropped.
    pub fn compile(alert: &Alert) -> CompiledAlert {
        CompiledAlert {
            keywords: lowercase_terms(&alert.keywords),
            technologies: lowercase_terms(&alert.technologies),
            locations: lowercase_terms(&alert.locations),
        }
    }

    /// Returns whether the job satisfies the alert.
    pub fn matches(alert: &Alert, job: &Job) -> bool {
        Self::compile(alert).matches(job)
    }
}

impl CompiledAlert {
    /// Evaluates the predicate against a job.
    pub fn matches(&self, job: &Job) -> bool {
        self.matches_haystack(job, &job.haystack())
    }

    /// Like [`matches`](Self::matches) with a precomputed
    /// [`Job::haystack`], for evaluating many alerts against one job.
    pub fn matches_haystack(&self, job: &Job, haystack: &str) -> bool {
        self.keywords_match(haystack) && self.technologies_match(job) && self.locations_match(job)
    }

    /// Returns the keywords found in the haystack, in alert order.
    pub fn matched_keywords(&self, haystack: &str) -> Vec<String> {
        self.keywords.iter().filter(|k| haystack.contains(k.as_str())).cloned().collect()
    }

    fn keywords_match(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|keyword| haystack.contains(keyword.as_str()))
    }

    fn technologies_match(&self, job: &Job) -> bool {
        if self.technologies.is_empty() {
            return true;
        }
        job.technologies.iter().any(|tech| {
            let tech = tech.trim().to_lowercase();
            self.technologies.iter().any(|wanted| *wanted == tech)
        })
    }

    fn locations_match(&self, job: &Job) -> bool {
        if self.locations.is_empty() {
            return true;
        }
        let location = job.location.to_lowercase();
        self.locations.iter().any(|wanted| location.contains(wanted.as_str()))
    }
}

fn lowercase_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{AlertBuilder, JobBuilder};

    #[test]
    fn test_keywords_use_or_semantics() {
        let alert = AlertBuilder::new(1).keywords(&["react", "golang"]).build();
        let job = JobBuilder::new("job-1")
            .title("Backend Engineer")
            .description("We write services in Golang.")
            .build();

        assert!(MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_keyword_matching_is_case_insensitive() {
        let alert = AlertBuilder::new(1).keywords(&["RUST"]).build();
        let job = JobBuilder::new("job-1").title("Senior rust engineer").build();

        assert!(MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_keywords_search_company_and_tags() {
        let alert = AlertBuilder::new(1).keywords(&["acme"]).build();
        let by_company = JobBuilder::new("job-1").title("Engineer").company("ACME Corp").build();
        assert!(MatchEngine::matches(&alert, &by_company));

        let alert = AlertBuilder::new(1).keywords(&["fintech"]).build();
        let by_tag = JobBuilder::new("job-2").title("Engineer").tags(&["FinTech"]).build();
        assert!(MatchEngine::matches(&alert, &by_tag));
    }

    #[test]
    fn test_keywords_do_not_search_location_or_technologies() {
        let alert = AlertBuilder::new(1).keywords(&["berlin", "kotlin"]).build();
        let job = JobBuilder::new("job-1")
            .title("Engineer")
            .location("Berlin")
            .technologies(&["kotlin"])
            .build();

        assert!(!MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_technology_filter_is_anded_with_keywords() {
        let alert = AlertBuilder::new(1).keywords(&["developer"]).technologies(&["rust"]).build();
        let job = JobBuilder::new("job-1")
            .title("Senior Developer")
            .technologies(&["python"])
            .build();

        assert!(!MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_technology_filter_uses_or_semantics() {
        let alert = AlertBuilder::new(1)
            .keywords(&["developer"])
            .technologies(&["rust", "go"])
            .build();
        let job = JobBuilder::new("job-1")
            .title("Senior Developer")
            .technologies(&["Python", "Go"])
            .build();

        assert!(MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_technology_filter_requires_exact_technology() {
        let alert = AlertBuilder::new(1).keywords(&["developer"]).technologies(&["go"]).build();
        let job = JobBuilder::new("job-1").title("Developer").technologies(&["golang"]).build();

        assert!(!MatchEngine::matches(&alert, &job));
    }

    #[test]
    fn test_location_filter_uses_substrings() {
        let alert = AlertBuilder::new(1)
            .keywords(&["engineer"])
            .locations(&["berlin", "remote"])
            .build();

        let berlin = JobBuilder::new("job-1").title("Engineer").location("Berlin, Germany").build();
        let paris = JobBuilder::new("job-2").title("Engineer").location("Paris, France").build();

        assert!(MatchEngine::matches(&alert, &berlin));
        assert!(!MatchEngine::matches(&alert, &paris));
    }

    #[test]
    fn test_empty_keywords_never_match() {
        let alert = AlertBuilder::new(1).keywords(&[]).build();
        let job = JobBuilder::new("job-1").title("Anything").build();

        assert!(!MatchEngine::matches(&alert, &job));

        let blank = AlertBuilder::new(2).keywords(&["  "]).build();
        assert!(!MatchEngine::matches(&blank, &job));
    }

    #[test]
    fn test_matched_keywords() {
        let alert = AlertBuilder::new(1).keywords(&["react", "golang", "rust"]).build();
        let job = JobBuilder::new("job-1").title("Rust and Go").description("golang").build();
        let compiled = MatchEngine::compile(&alert);

        assert_eq!(compiled.matched_keywords(&job.haystack()), vec!["golang", "rust"]);
    }
}
