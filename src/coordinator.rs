//! DualLegCoordinator: interlocks, dynamic slippage, sequential B-then-A
//! execution, leg state machine (§4.8). Grounded on
//! `arbitrage::executor::execute`'s sequential buy/sell/guard structure,
//! re-ordered and generalized to cross-venue legs with an inventory-low
//! skip path.

use crate::config::RuntimeConfig;
use crate::resilience::{retry_with_breaker, BreakerRegistry};
use crate::state::StateStore;
use crate::types::{ArbDirection, Cooldown, Direction, EdgeResult, ExecResult, LegOutcome, LegState, TradeLogEntry, TradeMode, VenueId};
use crate::venues::venue_a::reverse_precision_buffer;
use crate::venues::VenueAdapter;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub struct DualLegCoordinator {
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    state: Arc<StateStore>,
    breakers: Arc<BreakerRegistry>,
}

pub enum CoordinatorOutcome {
    Executed(TradeLogEntry),
    Aborted(String),
}

impl DualLegCoordinator {
    pub fn new(venue_a: Arc<dyn VenueAdapter>, venue_b: Arc<dyn VenueAdapter>, state: Arc<StateStore>, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            venue_a,
            venue_b,
            state,
            breakers,
        }
    }

    #[instrument(skip(self, config, trade_size, trade_size_usd), fields(symbol = %edge.symbol, direction = %edge.direction))]
    pub async fn execute(
        &self,
        edge: EdgeResult,
        config: &RuntimeConfig,
        trade_size: Decimal,
        trade_size_usd: Decimal,
        decimals: u32,
        inventory_low: bool,
        dry_run: bool,
    ) -> CoordinatorOutcome {
        if config.is_paused() {
            return CoordinatorOutcome::Aborted("paused".to_string());
        }
        if let Some(cap) = config.max_notional_per_trade {
            if trade_size_usd > cap {
                return CoordinatorOutcome::Aborted(format!("notional {trade_size_usd} exceeds cap {cap}"));
            }
        }
        if let Some(cap) = config.max_daily_trades {
            let today_count = self.state.daily_trade_count(&edge.symbol).await;
            if today_count >= cap {
                return CoordinatorOutcome::Aborted(format!("daily trade limit {cap} reached for {}", edge.symbol));
            }
        }

        let skip_sell = inventory_low;
        let dyn_slippage_bps = self.dynamic_slippage(edge.net_edge_bps, config);
        let started = Instant::now();
        let mode = if dry_run { TradeMode::Dry } else { TradeMode::Live };

        let mut legs = Vec::new();

        // Venue B first: higher confirmation latency, dominant failure risk.
        let b_outcome = if skip_sell && edge.sell_side == VenueId::B {
            LegOutcome {
                venue: VenueId::B,
                state: LegState::Skipped,
                tx_id: None,
                error: Some("Skipped - inventory below 80% of target".to_string()),
            }
        } else {
            self.execute_leg(VenueId::B, &edge, trade_size, decimals, dyn_slippage_bps, config, dry_run).await
        };
        let b_failed_hard = matches!(b_outcome.state, LegState::Failed);
        legs.push(b_outcome);

        if b_failed_hard {
            let entry = TradeLogEntry {
                timestamp: Utc::now(),
                mode,
                symbol: edge.symbol.clone(),
                direction: edge.direction,
                expected_edge: edge,
                legs,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            return CoordinatorOutcome::Executed(entry);
        }

        let a_outcome = if skip_sell && edge.sell_side == VenueId::A {
            LegOutcome {
                venue: VenueId::A,
                state: LegState::Skipped,
                tx_id: None,
                error: Some("Skipped - inventory below 80% of target".to_string()),
            }
        } else {
            self.execute_leg(VenueId::A, &edge, trade_size, decimals, dyn_slippage_bps, config, dry_run).await
        };
        legs.push(a_outcome);

        let entry = TradeLogEntry {
            timestamp: Utc::now(),
            mode,
            symbol: edge.symbol.clone(),
            direction: edge.direction,
            expected_edge: edge.clone(),
            legs: legs.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let any_success = legs.iter().any(|l| l.state == LegState::Success);
        let any_skipped = legs.iter().any(|l| l.state == LegState::Skipped);
        if any_success || any_skipped {
            let ends_at = Utc::now() + ChronoDuration::minutes(config.cooldown_minutes);
            let existing = self.state.cooldown(&edge.symbol).await;
            let proposed = Cooldown {
                ends_at,
                reason: "post-trade cooldown".to_string(),
            };
            let merged = match existing {
                Some(e) if e.ends_at > proposed.ends_at => e,
                _ => proposed,
            };
            self.state.set_cooldown(&edge.symbol, merged).await;
        }

        if let Err(e) = self.state.append_trade(&entry).await {
            error!(error = %e, "failed to append trade log entry");
        }

        CoordinatorOutcome::Executed(entry)
    }

    fn dynamic_slippage(&self, edge_bps: Decimal, config: &RuntimeConfig) -> Decimal {
        let base = config.max_slippage_bps;
        if edge_bps <= Decimal::ZERO {
            return base;
        }
        let scaled = edge_bps * config.dynamic_slippage_edge_ratio;
        scaled.max(base).min(base * config.dynamic_slippage_max_multiplier)
    }

    async fn execute_leg(
        &self,
        venue: VenueId,
        edge: &EdgeResult,
        trade_size: Decimal,
        decimals: u32,
        dyn_slippage_bps: Decimal,
        config: &RuntimeConfig,
        dry_run: bool,
    ) -> LegOutcome {
        let (adapter, direction) = if venue == edge.sell_side {
            (self.adapter_for(venue), Direction::Sell)
        } else {
            (self.adapter_for(venue), Direction::Buy)
        };

        if dry_run {
            info!(venue = %venue, "dry-run: skipping live swap submission");
            return LegOutcome {
                venue,
                state: LegState::Success,
                tx_id: Some("dry-run".to_string()),
                error: None,
            };
        }

        let limit = self.limit_for(venue, direction, dyn_slippage_bps, edge, decimals);

        let key = match venue {
            VenueId::A => "venue_a",
            VenueId::B => "venue_b",
        };
        let symbol = edge.symbol.clone();
        let result: Result<ExecResult, crate::error::AppError> = retry_with_breaker(&self.breakers, key, || {
            let adapter = Arc::clone(&adapter);
            let symbol = symbol.clone();
            async move { adapter.swap(&symbol, trade_size, direction, limit, 60).await }
        })
        .await;

        match result {
            Ok(exec) if exec.success => LegOutcome {
                venue,
                state: LegState::Success,
                tx_id: exec.tx_id,
                error: None,
            },
            Ok(exec) => LegOutcome {
                venue,
                state: LegState::Failed,
                tx_id: None,
                error: exec.error,
            },
            Err(e) => {
                warn!(venue = %venue, error = %e, "leg execution failed terminally");
                LegOutcome {
                    venue,
                    state: LegState::Failed,
                    tx_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn adapter_for(&self, venue: VenueId) -> Arc<dyn VenueAdapter> {
        match venue {
            VenueId::A => Arc::clone(&self.venue_a),
            VenueId::B => Arc::clone(&self.venue_b),
        }
    }

    /// Venue-A reverse-direction buys are exact-output: the base limit is
    /// pulled in a bit further by the precision buffer (§4.2) before the
    /// slippage allowance is applied, since the venue simulator rounds to
    /// the token's smallest unit.
    fn limit_for(&self, venue: VenueId, direction: Direction, dyn_slippage_bps: Decimal, edge: &EdgeResult, decimals: u32) -> Decimal {
        match direction {
            Direction::Sell => edge.income * (dec!(1) - dyn_slippage_bps / dec!(10000)),
            Direction::Buy => {
                let base = edge.expense * (dec!(1) + dyn_slippage_bps / dec!(10000));
                if venue == VenueId::A && edge.direction == ArbDirection::Reverse {
                    reverse_precision_buffer(base, dyn_slippage_bps, decimals)
                } else {
                    base
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::{VenueASimulator, VenueBSimulator};

    fn sample_edge() -> EdgeResult {
        EdgeResult {
            symbol: "GALA".into(),
            direction: ArbDirection::Forward,
            income: dec!(150),
            expense: dec!(140),
            bridge_cost: dec!(0.3125),
            risk_buffer: dec!(1.5),
            total_cost: dec!(141.8125),
            net_edge: dec!(8.1875),
            net_edge_bps: dec!(578),
            sell_side: VenueId::A,
            buy_side: VenueId::B,
            impact_bps_a: dec!(10),
            impact_bps_b: dec!(5),
            profitable: true,
            invalidations: vec![],
        }
    }

    #[tokio::test]
    async fn dry_run_reports_both_legs_success() {
        let dir = std::env::temp_dir().join(format!("dexarb-coord-{}", std::process::id()));
        let state = Arc::new(StateStore::load(&dir).unwrap());
        let va: Arc<dyn VenueAdapter> = Arc::new(VenueASimulator::new());
        let vb: Arc<dyn VenueAdapter> = Arc::new(VenueBSimulator::new());
        let coordinator = DualLegCoordinator::new(va, vb, state, Arc::new(BreakerRegistry::new()));
        let cfg = RuntimeConfig::test_default();
        let outcome = coordinator.execute(sample_edge(), &cfg, dec!(1000), dec!(10), 8, false, true).await;
        match outcome {
            CoordinatorOutcome::Executed(entry) => {
                assert_eq!(entry.legs.len(), 2);
                assert!(entry.legs.iter().all(|l| l.state == LegState::Success));
            }
            CoordinatorOutcome::Aborted(r) => panic!("unexpected abort: {r}"),
        }
    }

    #[tokio::test]
    async fn notional_cap_aborts_before_any_leg() {
        let dir = std::env::temp_dir().join(format!("dexarb-coord2-{}", std::process::id()));
        let state = Arc::new(StateStore::load(&dir).unwrap());
        let va: Arc<dyn VenueAdapter> = Arc::new(VenueASimulator::new());
        let vb: Arc<dyn VenueAdapter> = Arc::new(VenueBSimulator::new());
        let coordinator = DualLegCoordinator::new(va, vb, state, Arc::new(BreakerRegistry::new()));
        let mut cfg = RuntimeConfig::test_default();
        cfg.max_notional_per_trade = Some(dec!(1));
        let outcome = coordinator.execute(sample_edge(), &cfg, dec!(1000), dec!(100), 8, false, true).await;
        assert!(matches!(outcome, CoordinatorOutcome::Aborted(_)));
    }
}
