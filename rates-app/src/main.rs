//! # Rates Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and the query cache
//! - Create the import coordinator and the query service
//! - Run one import, or start the import worker and the HTTP server

mod config;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rates_hex::{
    ImportCoordinator, ImportWorker, MemoryCache, RateQueryService, inbound::HttpServer,
};
use rates_repo::{Repo, build_repo};
use rates_source::NbpClient;
use rates_types::{CachedQuery, QueryCache};

use config::{CacheBackend, Config};

#[derive(Parser)]
#[command(name = "rates-server", version, about = "NBP currency rates importer and query API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the periodic importer and the HTTP API (default)
    Serve,
    /// Import the current table once and exit
    Import,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rates_app=debug,rates_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing::info!("Using database: {}", config.database_url);

    // Build repository (handles connection and schema bootstrap)
    let repo = Arc::new(build_repo(&config.database_url).await?);

    let source = NbpClient::new(&config.nbp_base_url, config.source_timeout)?;
    let coordinator = ImportCoordinator::new(source, repo.clone(), &config.rates_table)
        .with_surface_errors(config.import_surface_errors);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Import => {
            coordinator.run().await?;
            Ok(())
        }
        Command::Serve => serve(config, repo, coordinator).await,
    }
}

async fn serve(
    config: Config,
    repo: Arc<Repo>,
    coordinator: ImportCoordinator<NbpClient, Arc<Repo>>,
) -> anyhow::Result<()> {
    let cache: Arc<dyn QueryCache<CachedQuery>> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCache::<CachedQuery>::new()),
        CacheBackend::Database => repo.clone(),
    };
    tracing::info!(
        "Query cache: {:?}, ttl {:?}",
        config.cache_backend,
        config.cache_ttl
    );

    let worker = ImportWorker::new(Arc::new(coordinator), config.import_interval);
    tokio::spawn(worker.run());

    let service = RateQueryService::new(repo, cache).with_ttl(config.cache_ttl);

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    tracing::info!("Starting rates server on port {}", config.port);
    server.run(&addr).await
}
