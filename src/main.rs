//! promo-radar entry point.
//!
//! `run-once` executes a single reconciliation cycle and prints the digest;
//! `schedule` runs cycles serially at the configured interval until
//! interrupted.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use promo_radar::config::{TrackerConfig, load_sources};
use promo_radar::persistence::SqliteStore;
use promo_radar::service::TrackerService;
use promo_radar::sources::{HttpFetcher, SourceRegistry};

#[derive(Debug, Parser)]
#[command(name = "promo-radar", about = "AI promotion tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one reconciliation cycle and print the change digest.
    RunOnce,
    /// Run cycles on a fixed interval until interrupted.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration and build the source registry
    let config = TrackerConfig::from_env();
    let sources = load_sources(&config.sources_file)?;
    let registry = SourceRegistry::from_configs(sources);
    tracing::info!(
        sources = registry.len(),
        db = %config.database_path.display(),
        "starting promo-radar"
    );

    // Open the store and wire the service
    let store = SqliteStore::connect(&config.database_path).await?;
    let fetcher = HttpFetcher::new(config.user_agent.clone());
    let service = TrackerService::new(registry, fetcher, store);

    match cli.command {
        Command::RunOnce => {
            let digest = service.run_cycle().await?;
            println!("{}", digest.summary());
        }
        Command::Schedule => {
            service.run_scheduled().await;
        }
    }

    Ok(())
}
