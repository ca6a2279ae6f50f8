//! MOMENTUM: SUI/USDC swap-and-swapback agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! loads the wallet, connects to the Sui RPC, starts price monitoring and
//! runs swap cycles until the requested count is reached or Ctrl+C.

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use momentum::config::AppConfig;
use momentum::engine::CycleOrchestrator;
use momentum::prices::{PriceAggregator, PriceFeed, PriceMonitor};
use momentum::sui::{LedgerClient, SuiKeypair, SuiRpcClient};
use momentum::swap::SwapEngine;

const BANNER: &str = r#"
 __  __  ___  __  __ _____ _   _ _____ _   _ __  __
|  \/  |/ _ \|  \/  | ____| \ | |_   _| | | |  \/  |
| |\/| | | | | |\/| |  _| |  \| | | | | | | | |\/| |
| |  | | |_| | |  | | |___| |\  | | | | |_| | |  | |
|_|  |_|\___/|_|  |_|_____|_| \_| |_|  \___/|_|  |_|

  SUI/USDC swap-and-swapback agent
"#;

#[derive(Parser, Debug)]
#[command(name = "momentum", version, about = "SUI/USDC swap-and-swapback agent")]
struct Cli {
    /// Number of swap cycles to run. Prompts when omitted.
    #[arg(short, long)]
    cycles: Option<String>,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "momentum.toml")]
    config: String,

    /// Dry-run transactions instead of executing them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let mut cfg = AppConfig::load(&cli.config)?;
    if cli.dry_run {
        cfg.swap.dry_run = true;
    }

    init_logging();
    println!("{BANNER}");

    let target_cycles = match cli.cycles {
        Some(raw) => parse_cycle_count(&raw),
        None => prompt_cycle_count(),
    };
    info!(
        target_cycles,
        rpc = %cfg.network.rpc_url,
        interval_ms = cfg.swap.swap_interval_ms,
        dry_run = cfg.swap.dry_run,
        "MOMENTUM starting up"
    );

    // -- Wallet & RPC ----------------------------------------------------

    let env_key = std::env::var("SUI_PRIVATE_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::new);
    let keypair = SuiKeypair::load(env_key, &cfg.wallet.key_file)?;
    let rpc = SuiRpcClient::connect(&cfg.network.rpc_url, cfg.network.request_timeout_secs, keypair).await?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(rpc);

    // -- Prices ----------------------------------------------------------

    let aggregator = PriceAggregator::from_config(&cfg.feeds)?;
    info!(sources = ?aggregator.source_names(), "Price sources configured");
    let feed: Arc<dyn PriceFeed> = Arc::new(aggregator);
    let monitor = Arc::new(PriceMonitor::new(feed, cfg.monitor.clone(), cfg.slippage.clone()));
    monitor.start_monitoring().await;

    // -- Swap engine & orchestrator --------------------------------------

    let engine = Arc::new(SwapEngine::new(&cfg, Arc::clone(&ledger), Some(Arc::clone(&monitor)))?);
    engine.pool_info().await;

    let orchestrator = Arc::new(CycleOrchestrator::new(
        engine,
        Arc::clone(&ledger),
        Arc::clone(&monitor),
        cfg.swap.clone(),
        target_cycles,
    ));
    println!("{}", orchestrator.portfolio().await);
    orchestrator.subscribe_to(&monitor);

    // -- Main loop -------------------------------------------------------

    let mut done = orchestrator.subscribe_done();
    orchestrator.spawn_attempt(Duration::ZERO);

    let period = Duration::from_millis(cfg.swap.swap_interval_ms);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = period.as_secs(), "Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !orchestrator.is_running() && !orchestrator.target_reached() {
                    orchestrator.spawn_attempt(Duration::ZERO);
                }
            }
            _ = done.wait_for(|reached| *reached) => {
                info!("All swap cycles complete");
                break;
            }
            _ = &mut shutdown => {
                warn!("Shutdown signal received");
                break;
            }
        }
    }

    monitor.stop_monitoring();
    println!("{}", orchestrator.final_statistics());
    println!("{}", orchestrator.portfolio().await);
    info!(state = %orchestrator.snapshot(), "MOMENTUM shut down cleanly.");

    Ok(())
}

/// Read a cycle count from stdin. Falls back to one cycle when stdin is
/// not interactive.
fn prompt_cycle_count() -> u32 {
    let answer = dialoguer::Input::<String>::new()
        .with_prompt("How many swap cycles?")
        .default("1".to_string())
        .interact_text();
    match answer {
        Ok(raw) => parse_cycle_count(&raw),
        Err(e) => {
            warn!(error = %e, "Cannot read cycle count, running 1 cycle");
            1
        }
    }
}

/// Positive integers are taken as-is; anything else means one cycle.
fn parse_cycle_count(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => {
            warn!(input = raw.trim(), "Invalid cycle count, defaulting to 1");
            1
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("momentum=info"));

    let json_logging = std::env::var("MOMENTUM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
