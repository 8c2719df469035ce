//! # FeeSweep: scheduled fee sweeper
//!
//! Usage:
//!   feesweep init                        # Write a default config file
//!   feesweep run                         # Start the scheduled job, stop with Ctrl-C
//!   feesweep once                        # Run a single tick and print its summary
//!   feesweep check-config                # Validate and print the effective config
//!   feesweep swap --token-in 0x… --token-out 0x… --amount 1000 --to 0x…

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feesweep_adapters::{JsonRpcClient, PriceApiClient, SwapClient, SwapParams};
use feesweep_core::{Address, FeeSweepConfig, U256};
use feesweep_scheduler::{Schedule, ScheduledJob, SingleFlightQueue};
use feesweep_transfer::FeeTransferJob;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "feesweep",
    version,
    about = "🧹 FeeSweep — move accumulated protocol fees to the collector on a schedule"
)]
struct Cli {
    /// Config file (defaults to ~/.feesweep/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Start the scheduled job and run until Ctrl-C
    Run,
    /// Run a single tick through the queue
    Once,
    /// Validate the config and print it
    CheckConfig,
    /// Swap tokens through the aggregator API
    Swap {
        #[arg(long)]
        token_in: Address,
        #[arg(long)]
        token_out: Address,
        /// Raw units of token_in
        #[arg(long)]
        amount: U256,
        /// Receiver of token_out
        #[arg(long)]
        to: Address,
        #[arg(long, default_value = "0.01")]
        slippage: f64,
    },
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn config_path(path: Option<&str>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(expand_path(p)),
        None => FeeSweepConfig::default_path(),
    }
}

fn load_config(path: Option<&str>) -> Result<FeeSweepConfig> {
    let config = match path {
        Some(p) => {
            let expanded = expand_path(p);
            FeeSweepConfig::load_from(Path::new(&expanded))
                .with_context(|| format!("loading {expanded}"))?
        }
        None => FeeSweepConfig::load()?,
    };
    Ok(config)
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    FeeSweepConfig::default()
        .save_to(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("✅ Wrote default config to {}", path.display());
    println!("   Set chain.holder, chain.destination and chain.sender before running.");
    Ok(())
}

/// Config checks plus the ones that need the scheduler.
fn validate(config: &FeeSweepConfig) -> Result<Schedule> {
    config.validate()?;
    let schedule = Schedule::parse(&config.job.schedule)?;
    Ok(schedule)
}

fn build_job(config: &FeeSweepConfig) -> Result<Arc<FeeTransferJob>> {
    let tokens = Arc::new(PriceApiClient::new(&config.price_api)?);
    let chain = Arc::new(JsonRpcClient::new(&config.chain)?);
    Ok(Arc::new(FeeTransferJob::new(tokens, chain, config)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "feesweep=debug,feesweep_core=debug,feesweep_scheduler=debug,feesweep_transfer=debug,feesweep_adapters=debug"
    } else {
        "feesweep=info,feesweep_core=info,feesweep_scheduler=info,feesweep_transfer=info,feesweep_adapters=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_arg = cli.config.as_deref();

    match cli.command {
        Command::Init { force } => init_config(&config_path(config_arg), force)?,
        Command::CheckConfig => {
            let config = load_config(config_arg)?;
            let schedule = validate(&config)?;
            println!("✅ Config OK (schedule: {schedule})\n");
            let mut shown = config.clone();
            if !shown.price_api.api_key.is_empty() {
                shown.price_api.api_key = "***".into();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        Command::Once => {
            let config = load_config(config_arg)?;
            let schedule = validate(&config)?;
            let job = build_job(&config)?;
            let scheduled = ScheduledJob::new(job.name(), schedule, SingleFlightQueue::new("fee-transfer"));

            let (tx, rx) = tokio::sync::oneshot::channel();
            let tick_job = job.clone();
            let handle = scheduled
                .trigger_now(async move {
                    let _ = tx.send(tick_job.execute_tick().await);
                })
                .into_handle()
                .context("queue unexpectedly busy")?;
            handle.await.context("tick task failed")?;

            match rx.await.ok().flatten() {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => anyhow::bail!("tick failed, see log for details"),
            }
        }
        Command::Run => {
            let config = load_config(config_arg)?;
            let schedule = validate(&config)?;
            let job = build_job(&config)?;
            let scheduled = ScheduledJob::new(job.name(), schedule, SingleFlightQueue::new("fee-transfer"));

            println!("🧹 FeeSweep job '{}' on '{}'", scheduled.name(), scheduled.schedule());
            println!("   Holder:      {}", config.chain.holder);
            println!("   Destination: {}", config.chain.destination);
            println!("   Chunk size:  {}", config.job.chunk_size);
            println!("   Press Ctrl-C to stop.\n");

            let handle = scheduled.start(job.into_callback())?;
            let mut check = tokio::time::interval(Duration::from_secs(1));
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    result = &mut ctrl_c => {
                        result?;
                        tracing::info!("🛑 Shutting down '{}'", handle.name());
                        break;
                    }
                    _ = check.tick() => {
                        if handle.is_finished() {
                            tracing::warn!("⚠️ Job '{}' has no more fire times, exiting", handle.name());
                            break;
                        }
                    }
                }
            }
            handle.stop().await;
        }
        Command::Swap {
            token_in,
            token_out,
            amount,
            to,
            slippage,
        } => {
            let config = load_config(config_arg)?;
            let params = SwapParams {
                token_in,
                token_out,
                amount,
                to,
                slippage,
            };
            let chain = JsonRpcClient::new(&config.chain)?;
            let swaps = SwapClient::new(PriceApiClient::new(&config.price_api)?);
            let receipt = swaps
                .execute_swap(&chain, &params, config.job.confirmations)
                .await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}
