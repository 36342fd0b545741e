use blog_content_backend::AppState;
use blog_content_backend::config::ContentConfig;
use blog_content_backend::infrastructure::{database, storage};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One-shot maintenance for the content store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove thumbnails not accessed for the given number of days
    SweepThumbnails {
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Remove blobs no registry or cache row accounts for
    SweepOrphans {
        /// Leave blobs younger than this many seconds alone
        #[arg(short, long)]
        grace_secs: Option<u64>,
    },
    /// Print thumbnail cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_admin=info,blog_content_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🧰 Starting content maintenance tool...");

    let config = ContentConfig::from_env();
    info!("🔌 Connecting to database...");
    let db = database::setup_database(&config.database_url).await?;
    info!("💾 Opening blob storage...");
    let blob_store = storage::setup_storage(&config).await?;

    let state = AppState::new(db, blob_store, config.clone());

    match cli.command {
        Command::SweepThumbnails { days } => {
            let days = days.unwrap_or(config.cache_expiry_days);
            if days < 1 {
                anyhow::bail!("--days must be at least 1");
            }
            let cleaned = state.thumbnails.sweep_expired(days).await?;
            info!(
                "✅ Removed {} thumbnail(s) not accessed for {} day(s)",
                cleaned, days
            );
        }
        Command::SweepOrphans { grace_secs } => {
            let grace = Duration::from_secs(grace_secs.unwrap_or(config.orphan_grace_secs));
            let report = state.file_service.sweep_orphans(grace).await?;
            info!(
                "✅ Removed {} orphan blob(s) (files: {}, blog-assets: {}, thumbnails: {})",
                report.total(),
                report.files,
                report.blog_assets,
                report.thumbnails
            );
        }
        Command::Stats => {
            let stats = state.thumbnails.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
