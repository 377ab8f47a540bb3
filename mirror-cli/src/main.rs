use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mirror::{MirrorConfig, MirrorEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mirror")]
#[command(about = "Rule-driven directory mirroring")]
struct Cli {
    /// Path to a JSON or YAML configuration file (built-in defaults if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the full-tree pass and exit instead of watching for changes
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MirrorConfig::load(path).await,
        None => MirrorConfig::default(),
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut engine = MirrorEngine::new(config).await?;

    let stats = engine.initial_sync().await;
    info!("Initial pass: {}", stats.summary());

    if cli.once {
        return Ok(());
    }

    engine.start_watching().await?;
    info!("Mirroring; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    engine.shutdown().await?;

    Ok(())
}
