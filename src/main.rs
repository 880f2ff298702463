use clap::{Parser, Subcommand};
use job_alerts::{
    cmd::{self, CleanupArgs, CreateAlertArgs, DeactivateAlertArgs, DispatchArgs, PostArgs},
    context::AppContextBuilder,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing `app.yaml`. Defaults to `configs`.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    /// Overrides the configured database URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Matches a job against active alerts and emails the owners.
    Dispatch(DispatchArgs),
    /// Creates an alert from a JSON definition.
    CreateAlert(CreateAlertArgs),
    /// Deactivates an alert.
    DeactivateAlert(DeactivateAlertArgs),
    /// Checks whether a job may be posted to a platform.
    CanPost(PostArgs),
    /// Records a social post if the dedup and cooldown windows allow it.
    RecordPost(PostArgs),
    /// Purges expired notification, rate limit and post records.
    Cleanup(CleanupArgs),
    /// Prints notification and post statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut builder = AppContextBuilder::new(cli.config_dir);
    if let Some(url) = cli.database_url {
        builder = builder.database_url(url);
    }
    let context = builder.build().await?;

    let result = match cli.command {
        Commands::Dispatch(args) => cmd::dispatch::execute(&context, args).await,
        Commands::CreateAlert(args) => cmd::alerts::create(&context, args).await,
        Commands::DeactivateAlert(args) => cmd::alerts::deactivate(&context, args).await,
        Commands::CanPost(args) => cmd::posts::can_post(&context, args).await,
        Commands::RecordPost(args) => cmd::posts::record_post(&context, args).await,
        Commands::Cleanup(args) => cmd::maintenance::cleanup(&context, args).await,
        Commands::Stats => cmd::stats(&context).await,
    };

    context.repo.close().await;
    Ok(result?)
}
