//! Profitability/freshness/cooldown/balance/window/pause interlocks (§4.5).
//! Grounded on `arbitrage::cooldown::RouteCooldown::is_cooled_down` for the
//! cooldown check and `arbitrage::executor::execute`'s sequential
//! early-return guard ordering.

use crate::config::RuntimeConfig;
use crate::state::StateStore;
use crate::types::EdgeResult;
use chrono::{DateTime, Utc};

pub struct RiskGateDecision {
    pub proceed: bool,
    pub reasons: Vec<String>,
    pub edge: EdgeResult,
}

pub struct RiskGate<'a> {
    config: &'a RuntimeConfig,
    state: &'a StateStore,
}

impl<'a> RiskGate<'a> {
    pub fn new(config: &'a RuntimeConfig, state: &'a StateStore) -> Self {
        Self { config, state }
    }

    pub async fn evaluate(&self, edge: EdgeResult, quotes_fresh: bool, balances_ok: bool, token_paused: bool) -> RiskGateDecision {
        let mut reasons = Vec::new();

        if !edge.profitable {
            reasons.extend(edge.invalidations.clone());
        }
        if !quotes_fresh {
            reasons.push("stale quote".to_string());
        }
        if let Some(cooldown) = self.state.cooldown(&edge.symbol).await {
            if cooldown.is_active(Utc::now()) {
                reasons.push(format!("cooldown active until {}", cooldown.ends_at));
            }
        }
        if !balances_ok {
            reasons.push("insufficient balance".to_string());
        }
        if token_paused {
            reasons.push("token paused (insufficient funds)".to_string());
        }
        if self.config.is_paused() {
            reasons.push("paused".to_string());
        }
        if let Some(reason) = self.trade_window_reason(Utc::now()) {
            reasons.push(reason);
        }

        RiskGateDecision {
            proceed: reasons.is_empty(),
            reasons,
            edge,
        }
    }

    fn trade_window_reason(&self, now: DateTime<Utc>) -> Option<String> {
        let (start, end) = (self.config.trade_window_start.as_deref()?, self.config.trade_window_end.as_deref()?);
        let current = now.format("%H:%M").to_string();
        if start <= end.to_string().as_str() {
            if current.as_str() < start || current.as_str() > end {
                return Some(format!("outside trade window {start}-{end}"));
            }
        } else if current.as_str() < start && current.as_str() > end {
            return Some(format!("outside trade window {start}-{end}"));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArbDirection, VenueId};
    use rust_decimal_macros::dec;

    fn sample_edge(profitable: bool) -> EdgeResult {
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
            profitable,
            invalidations: if profitable { vec![] } else { vec!["net_edge <= 0".into()] },
        }
    }

    #[tokio::test]
    async fn approved_when_all_checks_pass() {
        let dir = std::env::temp_dir().join(format!("dexarb-riskgate-{}", std::process::id()));
        let state = StateStore::load(&dir).unwrap();
        let cfg = RuntimeConfig::test_default();
        let gate = RiskGate::new(&cfg, &state);
        let decision = gate.evaluate(sample_edge(true), true, true, false).await;
        assert!(decision.proceed);
    }

    #[tokio::test]
    async fn rejected_when_unprofitable() {
        let dir = std::env::temp_dir().join(format!("dexarb-riskgate2-{}", std::process::id()));
        let state = StateStore::load(&dir).unwrap();
        let cfg = RuntimeConfig::test_default();
        let gate = RiskGate::new(&cfg, &state);
        let decision = gate.evaluate(sample_edge(false), true, true, false).await;
        assert!(!decision.proceed);
    }
}
