//! Durable state behind the dispatch engine: alerts, the notification
//! ledger, rate limit slots and the post history log.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteStateRepository;
pub use traits::{AlertStore, NotificationLedger, PostHistoryStore, RateLimitStore};
