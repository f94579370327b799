//! Thin `clap`-derived entry point: `run` (default) starts the bridge;
//! `config show`/`config path` inspect the effective configuration without
//! touching the transport.

use crate::commands::InMemoryCalendarTasks;
use crate::companion::CompanionClient;
use crate::config;
use crate::intent::IntentResolver;
use crate::orchestrator::{self, Orchestrator};
use crate::scheduler::Scheduler;
use crate::transport::RpcTransport;
use crate::voice::{SttClient, TtsClient};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "signal-choom-bridge")]
#[command(about = "Signal <-> AI companion messaging bridge")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Signal, start the scheduler, and run the intake loop (default)
    Run,
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective (deep-merged) configuration document
    Show,
    /// Print the resolved configuration file path
    Path,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge().await,
        Commands::Config { cmd } => config_command(cmd),
    }
}

fn config_command(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Path => println!("{}", config::get_config_path()?.display()),
        ConfigCommands::Show => {
            let cfg = config::load_config(None)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}

/// Process-level settings read once at startup from the environment, layered
/// over the config file. Only the owner identifier and default companion have
/// no safe default; everything else falls back to the config document.
async fn run_bridge() -> Result<()> {
    let mut config = config::load_config(None).context("failed to load configuration")?;
    if let Some(owner) = config::credentials::owner_from_env() {
        config.owner = owner;
    }
    if let Some(name) = config::credentials::default_companion_from_env() {
        config.default_companion = name;
    }
    if config.owner.is_empty() {
        anyhow::bail!("no owner identifier configured; set BRIDGE_OWNER or the config file's `owner` field");
    }
    if config.default_companion.is_empty() {
        anyhow::bail!(
            "no default companion configured; set BRIDGE_DEFAULT_COMPANION or the config file's `defaultCompanion` field"
        );
    }

    let bridge_home = crate::utils::get_bridge_home()?;
    let _instance_lock = orchestrator::acquire_process_lock(&bridge_home)
        .context("failed to acquire single-instance lock")?;

    let config_path = config::get_config_path()?;
    let owner = config.owner.clone();
    let default_companion = config.default_companion.clone();
    let attachments_dir = if config.signal.attachments_dir.is_empty() {
        bridge_home.join("attachments")
    } else {
        PathBuf::from(&config.signal.attachments_dir)
    };
    let socket_path = if config.signal.socket_path.is_empty() {
        bridge_home.join("signal.sock")
    } else {
        PathBuf::from(&config.signal.socket_path)
    };
    let connect_timeout = Duration::from_secs(config.signal.connect_timeout_secs);
    let poll_interval = Duration::from_secs(config.signal.poll_interval_secs);
    let directory_ttl = Duration::from_secs(config.companion_service.directory_ttl_secs);
    let variants = config.variants.clone();
    let filler_words = config.filler_words.clone();

    let transport = RpcTransport::new(socket_path, owner.clone());
    let transport_for_shutdown = transport.clone();
    let companion = Arc::new(CompanionClient::new(
        config.companion_service.base_url.clone(),
        config.companion_service.api_key.clone(),
        directory_ttl,
    ));
    let tts = Arc::new(TtsClient::new(
        config.tts.base_url.clone(),
        config.tts.api_key.clone(),
        config.tts.default_voice.clone(),
    ));
    let stt = Arc::new(SttClient::new(config.stt.base_url.clone(), config.stt.api_key.clone(), config.stt.model.clone()));
    let calendar: Arc<dyn crate::commands::CalendarTasks> = Arc::new(InMemoryCalendarTasks::new());
    let intent = Arc::new(IntentResolver::new(variants, filler_words, default_companion.clone()));
    let config_store = Arc::new(Mutex::new(config));

    let scheduler = Arc::new(Scheduler::new(
        config_store.clone(),
        config_path.clone(),
        transport.clone(),
        companion.clone(),
        tts.clone(),
        calendar.clone(),
        owner.clone(),
        default_companion.clone(),
        None,
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        transport,
        companion,
        tts,
        stt,
        calendar,
        intent,
        config_store,
        config_path,
        owner,
        attachments_dir,
        connect_timeout,
        poll_interval,
    ));

    info!("starting bridge");
    let scheduler_task = tokio::spawn(scheduler.clone().run());
    let intake_task = tokio::spawn(orchestrator.clone().run());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = wait_for_terminate() => {
            info!("received SIGTERM, shutting down");
        }
    }

    // Ordered stop: intake loop first so no new companion turns start, then
    // the scheduler so in-flight jobs get a chance to finish, then the
    // transport so the reader task exits and releases pending RPC waiters.
    orchestrator.stop();
    scheduler.shutdown().await;
    transport_for_shutdown.disconnect().await;

    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), intake_task).await;

    Ok(())
}
