//! Process entry point: parse CLI, bootstrap logging, load configuration,
//! hand off to the scheduler. Kept thin — all component wiring lives in
//! `scheduler::run`.

use anyhow::{Context, Result};
use clap::Parser;
use dexarb_core::config::Cli;
use dexarb_core::RuntimeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format);

    let config = RuntimeConfig::load(&cli).context("failed to load configuration")?;

    tracing::info!(
        dry_run = config.dry_run,
        tokens = config.tokens.len(),
        "dexarb-core starting"
    );

    dexarb_core::scheduler::run(config).await
}

fn init_logging(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
