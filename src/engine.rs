//! Collector/Strategy/Executor scaffold driving the trading loop (§5).
//! Grounded verbatim on `paper_trading::engine`'s trait shapes and
//! spawn order, narrowed to one collector (an interval ticker), one
//! strategy (per-token sequential evaluation), and one executor (the
//! `DualLegCoordinator`), since this domain has no multi-strategy
//! competition to broadcast-fan-out.

use crate::alerts::{AlertHub, AlertLevel};
use crate::balance_checker::BalanceChecker;
use crate::config::RuntimeConfig;
use crate::coordinator::{CoordinatorOutcome, DualLegCoordinator};
use crate::rate_resolver::RateResolver;
use crate::risk_gate::RiskGate;
use crate::state::StateStore;
use crate::token_evaluator::TokenEvaluator;
use crate::types::{EdgeResult, LegState};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, Sender};
use tokio::task::JoinSet;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

pub type CollectorStream<'a, E> = Pin<Box<dyn Stream<Item = E> + Send + 'a>>;

#[async_trait]
pub trait Collector<E>: Send + Sync {
    async fn get_event_stream(&self) -> Result<CollectorStream<'_, E>>;
}

#[async_trait]
pub trait Strategy<E, A>: Send + Sync {
    async fn sync_state(&mut self) -> Result<()>;
    async fn process_event(&mut self, event: E) -> Vec<A>;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait Executor<A>: Send + Sync {
    async fn execute(&self, action: A) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct TradeAction {
    pub edge: EdgeResult,
    pub trade_size: Decimal,
    pub trade_size_usd: Decimal,
    pub decimals: u32,
    pub inventory_low: bool,
}

/// Ticks the trading loop on a fixed interval. A separate instance with a
/// different period drives the bridge loop (§5: one scheduler thread per
/// cadence).
pub struct IntervalCollector {
    period: Duration,
}

impl IntervalCollector {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl Collector<Tick> for IntervalCollector {
    async fn get_event_stream(&self) -> Result<CollectorStream<'_, Tick>> {
        let interval = tokio::time::interval(self.period);
        let mut sequence = 0u64;
        let stream = IntervalStream::new(interval).map(move |_| {
            sequence += 1;
            Tick { sequence }
        });
        Ok(Box::pin(stream))
    }
}

/// Per-tick, per-token evaluation: balance snapshot once, then each enabled
/// token runs through `TokenEvaluator` and `RiskGate` sequentially (§5: "per-
/// token evaluations proceed sequentially"), producing zero or more approved
/// `TradeAction`s.
pub struct ArbitrageStrategy {
    config: Arc<RuntimeConfig>,
    state: Arc<StateStore>,
    token_evaluator: Arc<TokenEvaluator>,
    balance_checker: Arc<BalanceChecker>,
    rate_resolver: Arc<RateResolver>,
    alerts: Arc<AlertHub>,
}

impl ArbitrageStrategy {
    pub fn new(
        config: Arc<RuntimeConfig>,
        state: Arc<StateStore>,
        token_evaluator: Arc<TokenEvaluator>,
        balance_checker: Arc<BalanceChecker>,
        rate_resolver: Arc<RateResolver>,
        alerts: Arc<AlertHub>,
    ) -> Self {
        Self {
            config,
            state,
            token_evaluator,
            balance_checker,
            rate_resolver,
            alerts,
        }
    }
}

#[async_trait]
impl Strategy<Tick, TradeAction> for ArbitrageStrategy {
    async fn sync_state(&mut self) -> Result<()> {
        Ok(())
    }

    async fn process_event(&mut self, _event: Tick) -> Vec<TradeAction> {
        let mut actions = Vec::new();
        let snapshot = self.balance_checker.snapshot(&self.config, &self.rate_resolver, false).await;

        for token in &self.config.tokens {
            if !token.enabled {
                continue;
            }
            if snapshot.paused.contains(&token.symbol) {
                continue;
            }

            let evaluation = self.token_evaluator.evaluate(token, &self.config).await;
            let Some(edge) = evaluation.edge else {
                if !evaluation.reasons.is_empty() {
                    warn!(symbol = %token.symbol, reasons = ?evaluation.reasons, "no viable candidate this tick");
                }
                continue;
            };

            let inventory_low = snapshot.inventory_low.contains(&token.symbol);
            let balances_ok = snapshot.total_held(&token.symbol) > Decimal::ZERO || inventory_low;
            let token_paused = snapshot.paused.contains(&token.symbol);

            let gate = RiskGate::new(&self.config, &self.state);
            let decision = gate.evaluate(edge, true, balances_ok, token_paused).await;
            if !decision.proceed {
                warn!(symbol = %token.symbol, reasons = ?decision.reasons, "risk gate rejected candidate");
                continue;
            }

            actions.push(TradeAction {
                edge: decision.edge,
                trade_size: token.trade_size,
                trade_size_usd: token.trade_size * self.config.u_usd_fallback,
                decimals: token.decimals,
                inventory_low,
            });
        }

        actions
    }

    fn name(&self) -> &str {
        "arbitrage"
    }
}

/// Drives each approved action through the coordinator and turns the
/// outcome into the alerts §7 requires (dual-leg failure, partial success,
/// one-sided buy, bridge failure handled separately by the bridge loop).
pub struct CoordinatorExecutor {
    coordinator: Arc<DualLegCoordinator>,
    config: Arc<RuntimeConfig>,
    alerts: Arc<AlertHub>,
}

impl CoordinatorExecutor {
    pub fn new(coordinator: Arc<DualLegCoordinator>, config: Arc<RuntimeConfig>, alerts: Arc<AlertHub>) -> Self {
        Self { coordinator, config, alerts }
    }
}

#[async_trait]
impl Executor<TradeAction> for CoordinatorExecutor {
    async fn execute(&self, action: TradeAction) -> Result<()> {
        let outcome = self
            .coordinator
            .execute(
                action.edge,
                &self.config,
                action.trade_size,
                action.trade_size_usd,
                action.decimals,
                action.inventory_low,
                self.config.dry_run,
            )
            .await;

        match outcome {
            CoordinatorOutcome::Aborted(reason) => {
                warn!(reason = %reason, "trade aborted before execution");
            }
            CoordinatorOutcome::Executed(entry) => {
                let states: Vec<LegState> = entry.legs.iter().map(|l| l.state).collect();
                let all_success = states.iter().all(|s| *s == LegState::Success);
                let any_failed = states.iter().any(|s| *s == LegState::Failed);
                let any_skipped = states.iter().any(|s| *s == LegState::Skipped);

                if all_success {
                    info!(symbol = %entry.symbol, "dual-leg trade succeeded");
                } else if any_failed && states.iter().any(|s| *s == LegState::Success) {
                    self.alerts
                        .alert(
                            "partial trade success",
                            json!({"symbol": entry.symbol, "legs": states.iter().map(|s| format!("{s:?}")).collect::<Vec<_>>()}),
                            AlertLevel::Warn,
                        )
                        .await;
                } else if any_failed {
                    self.alerts
                        .alert(
                            "dual-leg trade failed",
                            json!({"symbol": entry.symbol, "direction": entry.direction.to_string()}),
                            AlertLevel::Error,
                        )
                        .await;
                } else if any_skipped {
                    self.alerts
                        .alert(
                            "one-sided buy (inventory low)",
                            json!({"symbol": entry.symbol}),
                            AlertLevel::Warn,
                        )
                        .await;
                }
            }
        }

        Ok(())
    }
}

/// Orchestrates data flow: collectors -> strategies -> executors, each on
/// its own spawned task communicating over broadcast channels.
pub struct Engine<E, A> {
    collectors: Vec<Box<dyn Collector<E>>>,
    strategies: Vec<Box<dyn Strategy<E, A>>>,
    executors: Vec<Box<dyn Executor<A>>>,
    event_channel_capacity: usize,
    action_channel_capacity: usize,
}

impl<E, A> Engine<E, A> {
    pub fn new() -> Self {
        Self {
            collectors: vec![],
            strategies: vec![],
            executors: vec![],
            event_channel_capacity: 64,
            action_channel_capacity: 64,
        }
    }

    pub fn add_collector(&mut self, collector: Box<dyn Collector<E>>) {
        self.collectors.push(collector);
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy<E, A>>) {
        self.strategies.push(strategy);
    }

    pub fn add_executor(&mut self, executor: Box<dyn Executor<A>>) {
        self.executors.push(executor);
    }
}

impl<E, A> Default for Engine<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, A> Engine<E, A>
where
    E: Send + Clone + 'static + std::fmt::Debug,
    A: Send + Clone + 'static + std::fmt::Debug,
{
    pub async fn run(self) -> Result<JoinSet<()>> {
        let (event_sender, _): (Sender<E>, _) = broadcast::channel(self.event_channel_capacity);
        let (action_sender, _): (Sender<A>, _) = broadcast::channel(self.action_channel_capacity);

        let mut set = JoinSet::new();

        for executor in self.executors {
            let mut receiver = action_sender.subscribe();
            set.spawn(async move {
                info!("starting executor");
                loop {
                    match receiver.recv().await {
                        Ok(action) => {
                            if let Err(e) = executor.execute(action).await {
                                error!(error = %e, "executor failed");
                            }
                        }
                        Err(e) => error!(error = %e, "action channel receive failed"),
                    }
                }
            });
        }

        for mut strategy in self.strategies {
            let mut event_receiver = event_sender.subscribe();
            let action_sender = action_sender.clone();

            if let Err(e) = strategy.sync_state().await {
                error!(strategy = strategy.name(), error = %e, "failed to sync strategy state");
                continue;
            }

            let name = strategy.name().to_string();
            set.spawn(async move {
                info!(strategy = %name, "starting strategy");
                loop {
                    match event_receiver.recv().await {
                        Ok(event) => {
                            for action in strategy.process_event(event).await {
                                if action_sender.send(action).is_err() {
                                    error!(strategy = %name, "no executors subscribed to receive action");
                                }
                            }
                        }
                        Err(e) => error!(strategy = %name, error = %e, "event channel receive failed"),
                    }
                }
            });
        }

        for collector in self.collectors {
            let event_sender = event_sender.clone();
            set.spawn(async move {
                info!("starting collector");
                match collector.get_event_stream().await {
                    Ok(mut stream) => {
                        while let Some(event) = stream.next().await {
                            if event_sender.send(event).is_err() {
                                error!("no strategies subscribed to receive event");
                            }
                        }
                    }
                    Err(e) => error!(error = %e, "failed to start collector event stream"),
                }
            });
        }

        Ok(set)
    }
}
