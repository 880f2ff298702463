#![warn(missing_docs)]
//! Job alert dispatch: matches newly ingested job postings against saved
//! alerts, emails each matching alert at most once under a per-recipient rate
//! limit, and tracks social re-posting with dedup and cooldown windows.

pub mod cmd;
pub mod config;
pub mod context;
pub mod engine;
pub mod http_client;
pub mod mailer;
pub mod models;
pub mod persistence;
pub mod test_helpers;
