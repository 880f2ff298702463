use std::path::PathBuf;

use clap::Parser;

use super::{CommandError, print_json, read_json};
use crate::{context::AppContext, models::Job};

/// Arguments for `dispatch`.
#[derive(Parser, Debug)]
pub struct DispatchArgs {
    /// Path to a JSON job posting.
    #[arg(short, long)]
    pub job: PathBuf,
}

/// Dispatches one job and prints the report.
pub async fn execute(context: &AppContext, args: DispatchArgs) -> Result<(), CommandError> {
    let job: Job = read_json(&args.job).await?;
    let report = context.dispatcher.dispatch(&job).await?;
    print_json(&report)
}
