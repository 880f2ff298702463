use clap::Parser;

use super::{CommandError, print_json};
use crate::context::AppContext;

/// Arguments for `cleanup`.
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Post history retention in days. Defaults to the configured retention.
    #[arg(long)]
    pub retention_days: Option<u32>,
}

/// Purges expired ledger records, delivery failures, rate limit slots and post history.
pub async fn cleanup(context: &AppContext, args: CleanupArgs) -> Result<(), CommandError> {
    let retention_days = args.retention_days.unwrap_or_else(|| {
        u32::try_from(context.config.post_history.retention.as_secs() / 86_400).unwrap_or(u32::MAX)
    });

    let summary = context.dispatcher.cleanup().await?;
    let posts = context.post_history.cleanup(retention_days).await?;
    print_json(&serde_json::json!({
        "notification_records": summary.notification_records,
        "delivery_failures": summary.delivery_failures,
        "rate_limit_slots": summary.rate_limit_slots,
        "post_records": posts,
    }))
}
