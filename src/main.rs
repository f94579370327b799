mod cli;
mod commands;
mod companion;
mod composer;
mod config;
mod envelope;
mod errors;
mod intent;
mod orchestrator;
mod scheduler;
mod transport;
mod utils;
mod voice;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,signal_choom_bridge=debug".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    cli::run().await
}
