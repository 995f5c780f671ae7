// crates/timetick-daemon/src/main.rs
//
// Binary entrypoint for the TimeTick keeper daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, builds the
// emission engine over an in-memory ledger and the system clock, and runs the
// batch scheduler until Ctrl-C.

mod config;
mod scheduler;

use std::time::Duration;

use clap::Parser;
use config::DaemonConfig;
use scheduler::BatchScheduler;

use timetick_core::token::Ttb;
use timetick_core::SystemClock;
use timetick_economics::{InMemoryLedger, TimeTickEngine};

/// TimeTick keeper daemon: mints time-linked TTB batches on schedule.
#[derive(Parser, Debug)]
#[command(name = "timetick-daemon", version = "0.1.0", about = "TimeTick emission keeper daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.timetick/config.toml")]
    config: String,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between batch checks.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Run the validated batch every N batches (0 disables).
    #[arg(long)]
    validate_every: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);

    // RUST_LOG wins, then --log-level, then the config file.
    let level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    let mut daemon_config = match loaded {
        Ok(cfg) => {
            tracing::info!("Loaded configuration from {}", config_path);
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "Could not load config from {}: {}. Using defaults.",
                config_path,
                e
            );
            DaemonConfig::default()
        }
    };

    if let Some(secs) = args.poll_interval {
        daemon_config.poll_interval_secs = secs;
    }
    if let Some(n) = args.validate_every {
        daemon_config.validate_every = n;
    }

    let params = daemon_config.economics.to_params()?;
    let accounts = daemon_config.accounts()?;

    tracing::info!("TimeTick Daemon v0.1.0");
    tracing::info!("Treasury: {}", accounts.treasury);
    tracing::info!("Reserve: {}", accounts.reserve);
    tracing::info!("Custody: {}", accounts.custody);
    tracing::info!(
        "Emission: {} per second, batches every {}s, stake unit {}",
        Ttb::from_ticks(params.emission_rate_per_second),
        params.batch_interval_secs,
        Ttb::from_ticks(params.stake_unit)
    );

    let ledger = InMemoryLedger::new();
    let engine = match daemon_config.genesis_time {
        Some(genesis) => {
            TimeTickEngine::with_genesis(params, accounts, ledger, SystemClock, genesis)?
        }
        None => TimeTickEngine::new(params, accounts, ledger, SystemClock)?,
    };

    let genesis = engine.network_stats().genesis_time;
    match chrono::DateTime::from_timestamp(genesis as i64, 0) {
        Some(at) => tracing::info!("Genesis: {} ({})", genesis, at.to_rfc3339()),
        None => tracing::info!("Genesis: {}", genesis),
    }

    let mut scheduler = BatchScheduler::new(
        engine,
        Duration::from_secs(daemon_config.poll_interval_secs),
        daemon_config.validate_every,
    );
    scheduler.run().await;

    let stats = scheduler.engine().network_stats();
    tracing::info!(
        "Shutting down after {} batches: supply {}, staked {} across {} stakers",
        scheduler.batches_run(),
        Ttb::from_ticks(stats.current_supply),
        Ttb::from_ticks(stats.total_staked),
        stats.staker_count
    );

    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
