//! Data models shared by the engine, the stores and the CLI.

pub mod alert;
pub mod job;
pub mod notification;
pub mod post;
pub mod stats;

pub use alert::{Alert, AlertValidationError, NewAlert};
pub use job::Job;
pub use notification::{AlertOutcome, DispatchOutcome, DispatchReport, NotificationRecord};
pub use post::{PostRecord, PostTarget};
pub use stats::{CleanupSummary, PostHistoryStats, RateLimitStats};
