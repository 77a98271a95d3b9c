//! Per-token, per-cycle candidate fan-out and selection (§4.7). Grounded on
//! `arbitrage::detector::scan_opportunities`'s fan-out-then-best-of shape and
//! `paper_trading::strategy`'s forward/reverse dual check.

use crate::config::RuntimeConfig;
use crate::edge_calculator::{compute_edge, EdgeCalculatorConfig};
use crate::rate_resolver::RateResolver;
use crate::resilience::{retry_with_breaker, BreakerRegistry};
use crate::types::{ArbDirection, Direction, DirectionPriority, EdgeResult, Quote, StrategySpec, TokenSpec};
use crate::venues::VenueAdapter;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, instrument, warn};

/// Quotes older than this are rejected before accounting even runs (§5: "no
/// suspension occurs inside the edge-calc ... critical sections" implies
/// freshness is a pre-check, not part of the accounting itself). Matches
/// RiskGate's default stale window (§4.5) so a quote that is fresh enough to
/// trade is also fresh enough to have survived this earlier check.
const STALE_QUOTE_WINDOW_SECS: i64 = 30;

pub struct TokenEvaluator {
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    rate_resolver: Arc<RateResolver>,
    breakers: Arc<BreakerRegistry>,
}

pub struct Evaluation {
    pub edge: Option<EdgeResult>,
    pub reasons: Vec<String>,
}

impl TokenEvaluator {
    pub fn new(
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        rate_resolver: Arc<RateResolver>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            venue_a,
            venue_b,
            rate_resolver,
            breakers,
        }
    }

    #[instrument(skip(self, config), fields(symbol = %token.symbol))]
    pub async fn evaluate(&self, token: &TokenSpec, config: &RuntimeConfig) -> Evaluation {
        let enabled_strategies: Vec<&StrategySpec> = token.strategies.iter().filter(|s| s.enabled).collect();
        if !enabled_strategies.is_empty() {
            return self.evaluate_strategies(token, &enabled_strategies, config).await;
        }

        let mut candidates = Vec::new();
        let mut reasons = Vec::new();

        let directions: Vec<ArbDirection> = match config.arbitrage_direction {
            DirectionPriority::Forward => vec![ArbDirection::Forward],
            DirectionPriority::Reverse if config.enable_reverse => vec![ArbDirection::Reverse],
            DirectionPriority::Reverse => {
                error!(symbol = %token.symbol, "reverse direction configured but enable_reverse is false; coercing to forward");
                vec![ArbDirection::Forward]
            }
            DirectionPriority::Best => {
                if config.enable_reverse {
                    vec![ArbDirection::Forward, ArbDirection::Reverse]
                } else {
                    vec![ArbDirection::Forward]
                }
            }
        };

        for direction in directions {
            let counter = match direction {
                ArbDirection::Forward => &token.quote_via_b,
                ArbDirection::Reverse => &token.quote_via_a,
            };
            match self
                .evaluate_pair(token, direction, counter, config.min_edge_bps, config.reverse_min_edge_bps, config)
                .await
            {
                Ok(edge) => candidates.push(edge),
                Err(reason) => reasons.push(reason),
            }
        }

        if candidates.is_empty() {
            return Evaluation { edge: None, reasons };
        }

        let approved: Vec<_> = candidates.iter().filter(|e| e.profitable).collect();
        let winner = if approved.is_empty() {
            reasons.extend(candidates.iter().flat_map(|e| e.invalidations.clone()));
            None
        } else {
            match config.arbitrage_direction {
                DirectionPriority::Forward => approved.into_iter().find(|e| e.direction == ArbDirection::Forward),
                DirectionPriority::Reverse => approved.into_iter().find(|e| e.direction == ArbDirection::Reverse),
                DirectionPriority::Best => approved
                    .into_iter()
                    .max_by(|a, b| a.net_edge_bps.cmp(&b.net_edge_bps).then(b.direction_priority_tiebreak().cmp(&a.direction_priority_tiebreak()))),
            }
            .cloned()
        };

        Evaluation { edge: winner, reasons }
    }

    /// §4.7 step 1/3: when a token configures an explicit strategy table,
    /// it replaces the forward/reverse dispatch entirely — each enabled
    /// strategy is its own candidate with its own counter-currency and
    /// `min_edge_bps`, and the winner is simply the highest `net_edge_bps`
    /// among approved strategies (no forward tie-break).
    async fn evaluate_strategies(&self, token: &TokenSpec, strategies: &[&StrategySpec], config: &RuntimeConfig) -> Evaluation {
        let mut candidates = Vec::new();
        let mut reasons = Vec::new();

        for strategy in strategies {
            let direction = if strategy.venue_a_op == Direction::Sell {
                ArbDirection::Forward
            } else {
                ArbDirection::Reverse
            };
            if direction == ArbDirection::Reverse && !config.enable_reverse {
                warn!(symbol = %token.symbol, strategy = %strategy.strategy_id, "strategy requires reverse direction but enable_reverse is false; skipping");
                reasons.push(format!("strategy {} requires disabled reverse direction", strategy.strategy_id));
                continue;
            }
            let counter = match direction {
                ArbDirection::Forward => &strategy.venue_b_counter,
                ArbDirection::Reverse => &strategy.venue_a_counter,
            };
            match self
                .evaluate_pair(token, direction, counter, strategy.min_edge_bps, strategy.min_edge_bps, config)
                .await
            {
                Ok(edge) => candidates.push(edge),
                Err(reason) => reasons.push(format!("strategy {}: {reason}", strategy.strategy_id)),
            }
        }

        if candidates.is_empty() {
            return Evaluation { edge: None, reasons };
        }

        let approved: Vec<_> = candidates.iter().filter(|e| e.profitable).collect();
        let winner = if approved.is_empty() {
            reasons.extend(candidates.iter().flat_map(|e| e.invalidations.clone()));
            None
        } else {
            approved.into_iter().max_by(|a, b| a.net_edge_bps.cmp(&b.net_edge_bps)).cloned()
        };

        Evaluation { edge: winner, reasons }
    }

    /// Shared quote-fetch/validate/accounting path for one candidate,
    /// parameterized by direction, counter-currency, and the `min_edge_bps`
    /// threshold that applies to it — used by both the forward/reverse
    /// dispatch and the per-strategy dispatch.
    async fn evaluate_pair(
        &self,
        token: &TokenSpec,
        direction: ArbDirection,
        counter: &str,
        min_edge_bps: Decimal,
        reverse_min_edge_bps: Decimal,
        config: &RuntimeConfig,
    ) -> Result<EdgeResult, String> {
        let trade_size = token.trade_size;
        let (sell_adapter, sell_key, buy_adapter, buy_key): (&Arc<dyn VenueAdapter>, &str, &Arc<dyn VenueAdapter>, &str) = match direction {
            ArbDirection::Forward => (&self.venue_a, "venue_a", &self.venue_b, "venue_b"),
            ArbDirection::Reverse => (&self.venue_b, "venue_b", &self.venue_a, "venue_a"),
        };

        let sell_quote = self
            .guarded_quote(sell_adapter, sell_key, &token.symbol, trade_size, Direction::Sell)
            .await
            .map_err(|e| format!("{direction} sell quote failed: {e}"))?;
        if !sell_quote.satisfies_q1() {
            return Err(format!("{direction} sell quote failed Q1"));
        }
        if !sell_quote.is_fresh(Utc::now(), STALE_QUOTE_WINDOW_SECS) {
            return Err(format!("{direction} sell quote stale"));
        }

        let buy_quote = self
            .guarded_quote(buy_adapter, buy_key, &token.symbol, trade_size, Direction::Buy)
            .await
            .map_err(|e| format!("{direction} buy quote failed: {e}"))?;
        if !buy_quote.satisfies_q1() {
            return Err(format!("{direction} buy quote failed Q1"));
        }
        if !buy_quote.is_fresh(Utc::now(), STALE_QUOTE_WINDOW_SECS) {
            return Err(format!("{direction} buy quote stale"));
        }

        let rate = self
            .rate_resolver
            .resolve(counter, trade_size, None)
            .await
            .ok_or_else(|| format!("{direction} rate resolution failed for {counter}"))?;

        let buy_in_u = buy_quote.price * trade_size * rate.rate;

        let cfg = EdgeCalculatorConfig {
            min_edge_bps,
            reverse_min_edge_bps,
            max_price_impact_bps: config.max_price_impact_bps,
            risk_buffer_bps: config.risk_buffer_bps,
            bridge_cost_usd: config.bridge_cost_usd,
            trades_per_bridge: config.trades_per_bridge,
            u_usd: Some(config.u_usd_fallback),
        };

        let (impact_a, impact_b) = match direction {
            ArbDirection::Forward => (sell_quote.price_impact_bps, buy_quote.price_impact_bps),
            ArbDirection::Reverse => (buy_quote.price_impact_bps, sell_quote.price_impact_bps),
        };

        Ok(compute_edge(direction, &sell_quote, buy_in_u, impact_a, impact_b, &cfg))
    }

    /// §4.10: every adapter call passes through the per-service circuit
    /// breaker before the retry policy — an open breaker rejects the call
    /// without ever reaching the network, a closed or half-open breaker
    /// lets the retry policy attempt (and re-report outcome to) the breaker.
    async fn guarded_quote(
        &self,
        adapter: &Arc<dyn VenueAdapter>,
        breaker_key: &str,
        symbol: &str,
        trade_size: Decimal,
        direction: Direction,
    ) -> crate::error::AppResult<Quote> {
        retry_with_breaker(&self.breakers, breaker_key, || {
            let adapter = Arc::clone(adapter);
            let symbol = symbol.to_string();
            async move { adapter.quote(&symbol, trade_size, direction).await }
        })
        .await
    }
}

trait TieBreak {
    fn direction_priority_tiebreak(&self) -> u8;
}

impl TieBreak for EdgeResult {
    fn direction_priority_tiebreak(&self) -> u8 {
        match self.direction {
            ArbDirection::Forward => 1,
            ArbDirection::Reverse => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::{VenueASimulator, VenueBSimulator};
    use rust_decimal_macros::dec;

    fn token() -> TokenSpec {
        TokenSpec {
            symbol: "GALA".into(),
            venue_a_id: crate::types::VenueATokenId {
                collection: "GALA".into(),
                category: "Unit".into(),
                type_: "none".into(),
                additional_key: "none".into(),
            },
            venue_b_id: crate::types::VenueBTokenId::parse("So11111111111111111111111111111111111111112").unwrap(),
            decimals: 8,
            trade_size: dec!(1000),
            enabled: true,
            quote_via_a: "GALA".into(),
            quote_via_b: "SOL".into(),
            inventory_target: None,
            strategies: vec![],
        }
    }

    #[tokio::test]
    async fn no_candidates_when_quotes_unavailable() {
        let va: Arc<dyn VenueAdapter> = Arc::new(VenueASimulator::new());
        let vb: Arc<dyn VenueAdapter> = Arc::new(VenueBSimulator::new());
        let resolver = Arc::new(RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.01)));
        let evaluator = TokenEvaluator::new(va, vb, resolver, Arc::new(BreakerRegistry::new()));
        let cfg = RuntimeConfig::test_default();
        let eval = evaluator.evaluate(&token(), &cfg).await;
        assert!(eval.edge.is_none());
        assert!(!eval.reasons.is_empty());
    }
}
