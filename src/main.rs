//! Ruleta API Server Binary
//!
//! Loads configuration, opens the wager store and serves the HTTP API.

use clap::Parser;
use ruleta::{
    api::ApiServer,
    config::{ConfigLoader, StorageBackend},
    EngineFactory, RuletaResult,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ruleta")]
#[command(about = "Roulette wager resolution engine", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// API server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// API server port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Database directory (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Keep balances in memory instead of RocksDB
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> RuletaResult<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path;
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.monitoring.log_filter)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        "Starting Ruleta"
    );

    let engine = EngineFactory::create_engine(&config)?;
    ApiServer::new(config.api.clone(), engine).run().await
}
