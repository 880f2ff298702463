use std::path::PathBuf;

use clap::Parser;

use super::{CommandError, print_json, read_json};
use crate::{context::AppContext, models::NewAlert, persistence::AlertStore};

/// Arguments for `create-alert`.
#[derive(Parser, Debug)]
pub struct CreateAlertArgs {
    /// Path to a JSON alert definition (`email`, `keywords`, optional
    /// `technologies` and `locations`).
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Arguments for `deactivate-alert`.
#[derive(Parser, Debug)]
pub struct DeactivateAlertArgs {
    /// Identifier of the alert to deactivate.
    #[arg(long)]
    pub id: i64,
}

/// Creates an alert and prints it.
pub async fn create(context: &AppContext, args: CreateAlertArgs) -> Result<(), CommandError> {
    let definition: NewAlert = read_json(&args.file).await?;
    let alert = context.repo.create(definition).await?;
    print_json(&alert)
}

/// Deactivates an alert.
pub async fn deactivate(
    context: &AppContext,
    args: DeactivateAlertArgs,
) -> Result<(), CommandError> {
    context.repo.deactivate(args.id).await?;
    print_json(&serde_json::json!({ "alert_id": args.id, "active": false }))
}
