//! CLI subcommands. Each command operates on an [`AppContext`] and prints its
//! result as JSON on stdout.

pub mod alerts;
pub mod dispatch;
pub mod maintenance;
pub mod posts;

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use alerts::{CreateAlertArgs, DeactivateAlertArgs};
pub use dispatch::DispatchArgs;
pub use maintenance::CleanupArgs;
pub use posts::PostArgs;

use crate::{context::AppContext, engine::DispatchError, persistence::PersistenceError};

/// Errors surfaced by CLI subcommands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input or output JSON was malformed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A store operation failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The dispatcher failed.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Reads and parses a JSON input file.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CommandError> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

/// Prints a value as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints aggregated statistics for alerts and post history.
pub async fn stats(context: &AppContext) -> Result<(), CommandError> {
    let notifications = context.dispatcher.stats().await?;
    let posts = context.post_history.stats().await?;
    print_json(&serde_json::json!({ "notifications": notifications, "posts": posts }))
}
