//! State Inspect CLI
//!
//! Read-only operator tool over the persisted `state.json` /
//! `bridge-state.json` files: prints inventory, active cooldowns, and the
//! bridge ledger without needing to attach to the running process.
//!
//! Usage:
//!   state-inspect --data-dir data
//!   state-inspect --data-dir data --cooldowns
//!   state-inspect --data-dir data --bridges
//!   state-inspect --data-dir data --bridges --pending-only
//!   state-inspect --data-dir data --metrics

use anyhow::{Context, Result};
use chrono::Utc;
use dexarb_core::state::StateStore;
use std::env;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_target(false).init();

    let args: Vec<String> = env::args().collect();
    let data_dir = parse_flag_value(&args, "--data-dir").unwrap_or_else(|| "data".to_string());

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(async move {
        let store = StateStore::load(&data_dir)?;
        let snapshot = store.read_snapshot().await;

        if args.iter().any(|a| a == "--cooldowns") {
            print_cooldowns(&snapshot);
        } else if args.iter().any(|a| a == "--bridges") {
            print_bridges(&snapshot, args.iter().any(|a| a == "--pending-only"));
        } else if args.iter().any(|a| a == "--inventory") {
            print_inventory(&snapshot);
        } else if args.iter().any(|a| a == "--metrics") {
            println!("{:#?}", store.performance_metrics().await);
        } else {
            print_summary(&snapshot);
        }

        Ok(())
    })
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn print_summary(state: &dexarb_core::state::BotState) {
    println!("State as of {}", state.updated_at);
    println!("  inventory version: {}", state.inventory_version);
    println!("  active cooldowns:  {}", state.cooldowns.iter().filter(|(_, c)| c.is_active(Utc::now())).count());
    println!(
        "  pending bridges:   {}",
        state.bridges.iter().filter(|b| b.status == dexarb_core::types::BridgeStatus::Pending).count()
    );
    println!("  total bridges logged: {}", state.bridges.len());
    info!("run with --cooldowns, --bridges, --inventory, or --metrics for detail");
}

fn print_inventory(state: &dexarb_core::state::BotState) {
    match &state.inventory {
        None => println!("no inventory snapshot recorded yet"),
        Some(snap) => {
            println!("venue A balances (v{}):", snap.venue_a.version);
            for (symbol, row) in &snap.venue_a.balances {
                println!("  {symbol}: {} (${})", row.human_balance, row.usd_value);
            }
            println!("venue B balances (v{}):", snap.venue_b.version);
            for (symbol, row) in &snap.venue_b.balances {
                println!("  {symbol}: {} (${})", row.human_balance, row.usd_value);
            }
            if !snap.inventory_low.is_empty() {
                println!("inventory-low: {:?}", snap.inventory_low);
            }
            if !snap.paused.is_empty() {
                println!("paused: {:?}", snap.paused);
            }
        }
    }
}

fn print_cooldowns(state: &dexarb_core::state::BotState) {
    let now = Utc::now();
    if state.cooldowns.is_empty() {
        println!("no cooldowns recorded");
        return;
    }
    for (symbol, cooldown) in &state.cooldowns {
        let marker = if cooldown.is_active(now) { "ACTIVE" } else { "expired" };
        println!("  {symbol}: {marker} until {} ({})", cooldown.ends_at, cooldown.reason);
    }
}

fn print_bridges(state: &dexarb_core::state::BotState, pending_only: bool) {
    let mut bridges: Vec<_> = state.bridges.iter().collect();
    if pending_only {
        bridges.retain(|b| b.status == dexarb_core::types::BridgeStatus::Pending);
    }
    if bridges.is_empty() {
        println!("no bridge records{}", if pending_only { " pending" } else { "" });
        return;
    }
    bridges.sort_by_key(|b| b.submitted_at);
    for b in bridges {
        println!(
            "  [{}] {} {} {:?} {:?} submitted {} retries={}",
            b.id, b.symbol, b.amount, b.direction, b.status, b.submitted_at, b.retry_count
        );
    }
}
