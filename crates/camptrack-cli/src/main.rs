mod analytics;
mod campaigns;
mod jobs;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "camptrack-cli")]
#[command(about = "Campaign analytics retrieval command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Fetch metrics for a batch of URLs and print per-item results and totals
    Fetch {
        /// Content URLs (YouTube, Instagram, TikTok)
        #[arg(required = true)]
        urls: Vec<String>,
        /// Print the raw JSON result instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Register content URLs for a campaign
    Register {
        #[arg(long)]
        campaign: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Enqueue analytics jobs for a campaign
    Enqueue {
        #[arg(long)]
        campaign: String,
        /// Platform to enqueue (repeatable); defaults to every supported platform
        #[arg(long = "platform")]
        platforms: Vec<String>,
    },
    /// Run one processor pass over pending jobs
    Process {
        /// Also fail `running` jobs that exceeded the stale threshold
        #[arg(long)]
        sweep: bool,
    },
    /// List a campaign's analytics jobs, newest first
    Jobs {
        #[arg(long)]
        campaign: String,
    },
    /// Show a campaign's analytics snapshot
    Snapshot {
        #[arg(long)]
        campaign: String,
        /// Recompute from stored metrics before printing
        #[arg(long)]
        refresh: bool,
    },
    /// Delete expired response cache entries
    PurgeCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("camptrack-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = camptrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = camptrack_db::PoolConfig::from_app_config(&config);
    let pool = camptrack_db::connect_pool(&config.database_url, pool_config).await?;
    tracing::debug!(?command, "running command");

    match command {
        Commands::Migrate => {
            camptrack_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Fetch { urls, json } => {
            analytics::run_fetch(&pool, &config, &urls, json).await?;
        }
        Commands::Register { campaign, urls } => {
            campaigns::run_register(&pool, &campaign, &urls).await?;
        }
        Commands::Enqueue {
            campaign,
            platforms,
        } => {
            jobs::run_enqueue(&pool, &campaign, &platforms).await?;
        }
        Commands::Process { sweep } => {
            jobs::run_process(&pool, &config, sweep).await?;
        }
        Commands::Jobs { campaign } => {
            jobs::run_list_jobs(&pool, &campaign).await?;
        }
        Commands::Snapshot { campaign, refresh } => {
            campaigns::run_snapshot(&pool, &campaign, refresh).await?;
        }
        Commands::PurgeCache => {
            analytics::run_purge_cache(&pool).await?;
        }
    }

    Ok(())
}
