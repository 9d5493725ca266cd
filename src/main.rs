//! # Prospector — Outreach Orchestration Engine
//!
//! Drives an automated outreach campaign: admits profiles against a daily
//! quota, dispatches connection requests one at a time through the
//! automation bridge, and schedules follow-ups for accepted connections.
//!
//! Usage:
//!   prospector                        # Start with ~/.prospector/config.toml
//!   prospector --config ./dev.toml    # Explicit config file
//!   prospector --port 9000            # Override the gateway port
//!   prospector --init-config          # Write a default config file and exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use prospector_channels::BridgeChannel;
use prospector_composer::LlmComposer;
use prospector_core::config::ProspectorConfig;
use prospector_core::traits::{MessageComposer, OutreachChannel};
use prospector_engine::Engine;
use prospector_gateway::AppState;
use prospector_scheduler::{Scheduler, SchedulerIntervals};
use prospector_store::Store;

#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "🎯 Prospector — rate-limited outreach orchestration"
)]
struct Cli {
    /// Path to the config file (default: ~/.prospector/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the gateway port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the gateway bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the sqlite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Write a default config file to the default path and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "prospector=debug,tower_http=debug"
    } else {
        "prospector=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if cli.init_config {
        let config = ProspectorConfig::default();
        config.save()?;
        println!("✅ Config written to {}", ProspectorConfig::default_path().display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => ProspectorConfig::load_from(path)?,
        None => ProspectorConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(db) = cli.db {
        config.database_path = db.display().to_string();
    }

    let store = Arc::new(Store::open(std::path::Path::new(&config.database_path))?);
    tracing::info!("💾 Store opened at {}", config.database_path);

    let channel: Arc<dyn OutreachChannel> =
        Arc::new(BridgeChannel::new(config.channel.clone())?);
    let composer: Arc<dyn MessageComposer> =
        Arc::new(LlmComposer::new(config.composer.clone()));

    let engine = Engine::new(
        Arc::clone(&store),
        channel,
        composer,
        config.daily_connection_limit,
        Duration::from_secs(config.action_delay_secs),
        config.followup_days,
    );

    let scheduler = Scheduler::new(
        engine.clone(),
        SchedulerIntervals {
            dispatch: Duration::from_secs(config.followup_dispatch_interval_secs),
            schedule: Duration::from_secs(config.followup_schedule_interval_secs),
        },
    );
    tokio::spawn(scheduler.run());

    let state = Arc::new(AppState {
        store,
        engine,
        start_time: std::time::Instant::now(),
    });
    prospector_gateway::start_server(&config.gateway, state).await?;
    Ok(())
}
