/**
 * driver-sync
 *
 * Maintenance CLI for the local sync store: inspect the outbox, force a
 * drain against the configured backend, or drop the entity cache.
 *
 *   driver-sync status
 *   driver-sync sync [--token <bearer>]
 *   driver-sync clear-cache
 */
use clap::{Parser, Subcommand};
use fieldsync::client::{Config, HttpDeliveryApi, LocalDatabase, NetworkMonitor, SyncEngine};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "driver-sync")]
#[command(about = "Inspect and drive the local delivery sync store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Show queue and cache counts
    Status,

    /// Run one drain against the configured server
    Sync {
        /// Bearer token for this run, overriding the configured one
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove cached deliveries, routes and driver profiles
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    let db_path = config.database_path();
    tracing::debug!(path = %db_path.display(), "opening local store");
    let store = LocalDatabase::open(&db_path).await?;

    match command {
        Command::Status => {
            let stats = store.get_stats().await?;
            println!("store:          {}", db_path.display());
            println!("schema version: {}", store.schema_version().await?);
            println!("pending:        {}", stats.pending_actions);
            println!("dead letters:   {}", stats.dead_letters);
            println!("photos:         {}", stats.stored_photos);
            println!("deliveries:     {}", stats.cached_deliveries);
            println!("routes:         {}", stats.cached_routes);
        }
        Command::Sync { token } => {
            if let Some(token) = token {
                config.set_token(Some(token));
            }
            let api = HttpDeliveryApi::new(config.clone())?;
            let engine = SyncEngine::new(
                store.clone(),
                Arc::new(api),
                NetworkMonitor::new(true),
                config.sync(),
            );

            let report = engine.sync_now().await;
            println!(
                "synced {} / failed {} / dropped {} / dead-lettered {} ({} still pending)",
                report.synced,
                report.failed,
                report.dropped,
                report.dead_lettered,
                engine.status().pending
            );
        }
        Command::ClearCache => {
            let removed = store.clear_cache().await?;
            println!("removed {} cached records", removed);
        }
    }

    store.close().await;
    Ok(())
}
