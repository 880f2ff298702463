//! Social re-posting history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform plus an optional sub-channel (e.g. `reddit` + `r/programming`).
/// The cooldown window applies per target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PostTarget {
    /// Lowercase platform identifier.
    pub platform: String,
    /// Optional sub-channel, compared exactly after trimming.
    pub sub_channel: Option<String>,
}

impl PostTarget {
    /// Creates a normalized target. A blank sub-channel is treated as none.
    pub fn new(platform: &str, sub_channel: Option<&str>) -> Self {
        let sub_channel =
            sub_channel.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Self { platform: platform.trim().to_lowercase(), sub_channel }
    }
}

impl fmt::Display for PostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_channel {
            Some(sub_channel) => write!(f, "{}/{}", self.platform, sub_channel),
            None => write!(f, "{}", self.platform),
        }
    }
}

/// A job that was posted to a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRecord {
    /// The posted job.
    pub job_id: String,
    /// Where it was posted.
    pub target: PostTarget,
    /// When it was posted.
    pub posted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_normalization() {
        let target = PostTarget::new(" Reddit ", Some(" r/programming "));
        assert_eq!(target.platform, "reddit");
        assert_eq!(target.sub_channel.as_deref(), Some("r/programming"));
        assert_eq!(target.to_string(), "reddit/r/programming");

        let target = PostTarget::new("twitter", Some("  "));
        assert_eq!(target.sub_channel, None);
        assert_eq!(target.to_string(), "twitter");
    }
}
