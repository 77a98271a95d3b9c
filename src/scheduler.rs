//! Process wiring: constructs every component, spawns the trading-loop
//! engine and the independent bridge loop, and waits on a signal-driven
//! graceful shutdown (§5). Grounded on the teacher's `main.rs` bootstrap
//! shape and `data_collector::mod`'s free-running interval loop, generalized
//! here to two independent cadences instead of one.

use crate::alerts::{AlertHub, AlertSink, DiscordAlertSink, LogAlertSink};
use crate::balance_checker::BalanceChecker;
use crate::bridge::{BridgeController, BridgeSimulator};
use crate::config::RuntimeConfig;
use crate::coordinator::DualLegCoordinator;
use crate::engine::{ArbitrageStrategy, CoordinatorExecutor, Engine, IntervalCollector, Tick, TradeAction};
use crate::rate_resolver::RateResolver;
use crate::resilience::BreakerRegistry;
use crate::state::StateStore;
use crate::token_evaluator::TokenEvaluator;
use crate::venues::{VenueASimulator, VenueBSimulator};
use anyhow::Result;
use futures::stream::StreamExt;
use signal_hook::consts::SIGTERM;
use signal_hook_tokio::Signals;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const TRADING_LOOP_PERIOD_SECS: u64 = 15;
const BRIDGE_POLL_PERIOD_SECS: u64 = 15;

pub async fn run(config: RuntimeConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(StateStore::load(&config.data_dir)?);

    let venue_a: Arc<crate::venues::VenueASimulator> = Arc::new(VenueASimulator::new());
    let venue_b: Arc<crate::venues::VenueBSimulator> = Arc::new(VenueBSimulator::new());
    let venue_a_dyn: Arc<dyn crate::venues::VenueAdapter> = venue_a.clone();
    let venue_b_dyn: Arc<dyn crate::venues::VenueAdapter> = venue_b.clone();

    let rate_resolver = Arc::new(RateResolver::new(venue_a_dyn.clone(), config.u_usd_fallback));
    // Shared per-service breaker state: both the quote path (TokenEvaluator) and
    // the swap path (DualLegCoordinator) trip and observe the same "venue_a"/
    // "venue_b" breakers (§4.10 is per-service, not per-component).
    let breakers = Arc::new(BreakerRegistry::new());
    let token_evaluator = Arc::new(TokenEvaluator::new(
        venue_a_dyn.clone(),
        venue_b_dyn.clone(),
        Arc::clone(&rate_resolver),
        Arc::clone(&breakers),
    ));

    let owner_a = std::env::var("GALACHAIN_ADDRESS").unwrap_or_else(|_| "operator-a".to_string());
    let owner_b = std::env::var("SOLANA_ADDRESS").unwrap_or_else(|_| "operator-b".to_string());
    let balance_checker = Arc::new(BalanceChecker::new(
        venue_a_dyn.clone(),
        venue_b_dyn.clone(),
        owner_a,
        owner_b,
        Arc::clone(&state),
    ));

    let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogAlertSink)];
    if config.enable_alerts {
        if let Some(url) = &config.alert_webhook_url {
            sinks.push(Box::new(DiscordAlertSink::new(url.clone())));
        } else {
            warn!("alerts enabled but no webhook configured; logging only");
        }
    }
    let alerts = Arc::new(AlertHub::new(sinks));

    let coordinator = Arc::new(DualLegCoordinator::new(
        venue_a_dyn.clone(),
        venue_b_dyn.clone(),
        Arc::clone(&state),
        Arc::clone(&breakers),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_handle = state.spawn_flush_loop(shutdown_rx.clone());

    let bridge_controller = Arc::new(BridgeController::new(Arc::new(BridgeSimulator::new()), Arc::clone(&state), Arc::clone(&alerts)));
    let bridge_task = spawn_bridge_loop(
        Arc::clone(&bridge_controller),
        Arc::clone(&config),
        Arc::clone(&balance_checker),
        Arc::clone(&rate_resolver),
        shutdown_rx.clone(),
    );

    let mut engine: Engine<Tick, TradeAction> = Engine::new();
    engine.add_collector(Box::new(IntervalCollector::new(Duration::from_secs(TRADING_LOOP_PERIOD_SECS))));
    engine.add_strategy(Box::new(ArbitrageStrategy::new(
        Arc::clone(&config),
        Arc::clone(&state),
        Arc::clone(&token_evaluator),
        Arc::clone(&balance_checker),
        Arc::clone(&rate_resolver),
        Arc::clone(&alerts),
    )));
    engine.add_executor(Box::new(CoordinatorExecutor::new(Arc::clone(&coordinator), Arc::clone(&config), Arc::clone(&alerts))));

    info!(period_secs = TRADING_LOOP_PERIOD_SECS, dry_run = config.dry_run, "trading loop starting");
    let mut engine_tasks = engine.run().await?;

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, winding down");

    let _ = shutdown_tx.send(true);
    engine_tasks.abort_all();
    bridge_task.abort();
    let _ = flush_handle.await;

    Ok(())
}

fn spawn_bridge_loop(
    controller: Arc<BridgeController>,
    config: Arc<RuntimeConfig>,
    balance_checker: Arc<BalanceChecker>,
    rate_resolver: Arc<RateResolver>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut imbalance_ticker = tokio::time::interval(Duration::from_secs((config.bridge_check_interval_minutes.max(1) as u64) * 60));
        let mut poll_ticker = tokio::time::interval(Duration::from_secs(BRIDGE_POLL_PERIOD_SECS));

        loop {
            tokio::select! {
                _ = imbalance_ticker.tick() => {
                    let snapshot = balance_checker.snapshot(&config, &rate_resolver, true).await;
                    controller.run_cycle(&config, &snapshot).await;
                }
                _ = poll_ticker.tick() => {
                    controller.poll_pending(&config).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("bridge loop stopping");
                        break;
                    }
                }
            }
        }
    })
}

async fn wait_for_shutdown_signal() {
    let mut signals = match Signals::new([SIGTERM]) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, relying on ctrl_c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = signals.next() => {}
    }
}
