use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use github_client::GithubClient;
use gorse_client::Gorse;
use starfeed_common::Config;
use starfeed_sync::jobs;
use starfeed_sync::labels::Vocabulary;
use starfeed_sync::scheduler::{IdentityStore, Scheduler};
use starfeed_sync::traits::CatalogStore;

/// Incremental sync of starred repositories into the recommendation
/// store.
#[derive(Parser)]
#[command(name = "starfeed-sync")]
struct Args {
    /// Sync a single identity by login instead of all due identities.
    #[arg(long)]
    user: Option<String>,

    /// Ignore checkpoints and crawl full star histories.
    #[arg(long)]
    full: bool,

    /// Retire catalog entries whose repositories were removed or renamed.
    #[arg(long)]
    prune: bool,

    /// Re-run taxonomy optimization across the whole catalog.
    #[arg(long)]
    refresh_labels: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("starfeed_sync=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.prune || args.refresh_labels {
        return run_maintenance(&args).await;
    }

    let config = Config::from_env();
    let store: Arc<dyn CatalogStore> =
        Arc::new(Gorse::new(&config.gorse_endpoint, &config.gorse_api_key));

    info!("Building vocabulary snapshot...");
    let vocabulary = Arc::new(Vocabulary::build(store.as_ref(), config.min_label_freq).await?);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to identity database")?;
    let identities = IdentityStore::new(pool);

    let scheduler = Scheduler::new(identities, store, vocabulary, config);
    let stats = match &args.user {
        Some(login) => scheduler.run_one(login, args.full).await?,
        None => scheduler.run(args.full).await?,
    };
    info!(
        synced = stats.synced,
        deactivated = stats.deactivated,
        failed = stats.failed,
        "sync batch complete"
    );
    Ok(())
}

async fn run_maintenance(args: &Args) -> Result<()> {
    let config = Config::jobs_from_env();
    let store: Arc<dyn CatalogStore> =
        Arc::new(Gorse::new(&config.gorse_endpoint, &config.gorse_api_key));

    if args.prune {
        let token = config
            .github_token
            .as_deref()
            .context("GITHUB_TOKEN is required for --prune")?;
        let github = GithubClient::new(token);
        jobs::prune(store.as_ref(), &github).await?;
    }

    if args.refresh_labels {
        let vocabulary = Vocabulary::build(store.as_ref(), config.min_label_freq).await?;
        jobs::refresh_labels(store.as_ref(), &vocabulary).await?;
    }

    Ok(())
}
