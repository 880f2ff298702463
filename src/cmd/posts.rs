use clap::Parser;

use super::{CommandError, print_json};
use crate::{context::AppContext, models::PostTarget};

/// Arguments shared by `can-post` and `record-post`.
#[derive(Parser, Debug)]
pub struct PostArgs {
    /// Identifier of the job.
    #[arg(long)]
    pub job_id: String,
    /// Target platform, e.g. `reddit`.
    #[arg(long)]
    pub platform: String,
    /// Optional sub-channel, e.g. `r/rust`.
    #[arg(long)]
    pub sub_channel: Option<String>,
}

impl PostArgs {
    fn target(&self) -> PostTarget {
        PostTarget::new(&self.platform, self.sub_channel.as_deref())
    }
}

/// Prints whether the job may be posted to the target now.
pub async fn can_post(context: &AppContext, args: PostArgs) -> Result<(), CommandError> {
    let target = args.target();
    let allowed = context.post_history.can_post(&args.job_id, &target).await?;
    print_json(&serde_json::json!({
        "job_id": args.job_id,
        "target": target.to_string(),
        "can_post": allowed,
    }))
}

/// Records a post if both windows allow it and prints whether it did.
pub async fn record_post(context: &AppContext, args: PostArgs) -> Result<(), CommandError> {
    let target = args.target();
    let recorded = context.post_history.try_record(&args.job_id, &target).await?;
    print_json(&serde_json::json!({
        "job_id": args.job_id,
        "target": target.to_string(),
        "recorded": recorded,
    }))
}
