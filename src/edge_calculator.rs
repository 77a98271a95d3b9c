//! Universal income/expense accounting (§4.4), grounded on `tax::TaxRecord`'s
//! all-Decimal monetary-field style and the fee-breakdown shape of the
//! reference pack's cross-chain profitability calculator, generalized from a
//! USD-denominated percentage basis to a U-denominated bps basis.

use crate::types::{ArbDirection, EdgeResult, Quote, VenueId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub struct EdgeCalculatorConfig {
    pub min_edge_bps: Decimal,
    pub reverse_min_edge_bps: Decimal,
    pub max_price_impact_bps: Decimal,
    pub risk_buffer_bps: Decimal,
    pub bridge_cost_usd: Decimal,
    pub trades_per_bridge: u32,
    pub u_usd: Option<Decimal>,
}

impl EdgeCalculatorConfig {
    fn u_usd_or_default(&self) -> Decimal {
        self.u_usd.filter(|v| !v.is_zero()).unwrap_or(dec!(0.01))
    }

    fn bridge_cost_u(&self) -> Decimal {
        if self.trades_per_bridge == 0 {
            return Decimal::ZERO;
        }
        (self.bridge_cost_usd / self.u_usd_or_default()) / Decimal::from(self.trades_per_bridge)
    }
}

/// Computes the universal EdgeResult from a sell-side quote, a buy-side
/// quote (already denominated in U via the RateResolver), and the direction
/// they represent.
pub fn compute_edge(
    direction: ArbDirection,
    sell_quote: &Quote,
    buy_quote_in_u: Decimal,
    impact_bps_a: Decimal,
    impact_bps_b: Decimal,
    cfg: &EdgeCalculatorConfig,
) -> EdgeResult {
    let income = sell_quote.min_output.unwrap_or_default();
    let expense = buy_quote_in_u;
    let bridge_cost = cfg.bridge_cost_u();
    let risk_buffer = income * cfg.risk_buffer_bps / dec!(10000);

    let net_edge = income - expense - bridge_cost - risk_buffer;
    let total_cost = expense + bridge_cost + risk_buffer;
    let net_edge_bps = if total_cost.is_zero() {
        Decimal::ZERO
    } else {
        (net_edge / total_cost) * dec!(10000)
    };

    let mut invalidations = Vec::new();

    let prices_finite_positive = sell_quote.price.is_sign_positive()
        && !sell_quote.price.is_zero()
        && buy_quote_in_u.is_sign_positive();
    if !prices_finite_positive {
        invalidations.push("non-positive price or rate".to_string());
    }
    if net_edge <= Decimal::ZERO {
        invalidations.push("net_edge <= 0".to_string());
    }
    let min_edge_bps = match direction {
        ArbDirection::Forward => cfg.min_edge_bps,
        ArbDirection::Reverse => cfg.reverse_min_edge_bps,
    };
    if net_edge_bps < min_edge_bps {
        invalidations.push(format!("net_edge_bps {net_edge_bps} below minimum {min_edge_bps}"));
    }
    if impact_bps_a.abs() > cfg.max_price_impact_bps || impact_bps_b.abs() > cfg.max_price_impact_bps {
        invalidations.push("price impact exceeds maximum".to_string());
    }

    EdgeResult {
        symbol: sell_quote.symbol.clone(),
        direction,
        income,
        expense,
        bridge_cost,
        risk_buffer,
        total_cost,
        net_edge,
        net_edge_bps,
        sell_side: direction.sell_side(),
        buy_side: direction.buy_side(),
        impact_bps_a,
        impact_bps_b,
        profitable: invalidations.is_empty(),
        invalidations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, VenueId};
    use chrono::Utc;

    fn quote(venue: VenueId, min_output: Decimal) -> Quote {
        let now = Utc::now();
        Quote {
            symbol: "T".into(),
            venue,
            direction: Direction::Sell,
            price: min_output / dec!(1000),
            currency: "U".into(),
            trade_size: dec!(1000),
            min_output: Some(min_output),
            price_impact_bps: dec!(10),
            provider_fee_hint: None,
            priority_fee_hint: None,
            pool_liquidity_hint: None,
            timestamp: now,
            expires_at: now + chrono::Duration::seconds(30),
            valid: true,
            error: None,
        }
    }

    #[test]
    fn scenario_one_happy_path_forward() {
        let cfg = EdgeCalculatorConfig {
            min_edge_bps: dec!(30),
            reverse_min_edge_bps: dec!(30),
            max_price_impact_bps: dec!(300),
            risk_buffer_bps: dec!(100),
            bridge_cost_usd: dec!(1.25),
            trades_per_bridge: 100,
            u_usd: Some(dec!(0.04)),
        };
        let sell = quote(VenueId::A, dec!(150));
        let edge = compute_edge(ArbDirection::Forward, &sell, dec!(140), dec!(10), dec!(5), &cfg);
        assert_eq!(edge.bridge_cost, dec!(0.3125));
        assert_eq!(edge.risk_buffer, dec!(1.5));
        assert_eq!(edge.net_edge, dec!(8.1875));
        assert!(edge.profitable);
        assert!(edge.sides_distinct());
        assert!(edge.sides_match_direction());
    }

    #[test]
    fn below_min_edge_is_invalidated() {
        let cfg = EdgeCalculatorConfig {
            min_edge_bps: dec!(1000),
            reverse_min_edge_bps: dec!(1000),
            max_price_impact_bps: dec!(300),
            risk_buffer_bps: dec!(100),
            bridge_cost_usd: dec!(1.25),
            trades_per_bridge: 100,
            u_usd: Some(dec!(0.04)),
        };
        let sell = quote(VenueId::A, dec!(150));
        let edge = compute_edge(ArbDirection::Forward, &sell, dec!(140), dec!(10), dec!(5), &cfg);
        assert!(!edge.profitable);
        assert!(edge.invalidations.iter().any(|r| r.contains("below minimum")));
    }

    #[test]
    fn excessive_impact_is_invalidated() {
        let cfg = EdgeCalculatorConfig {
            min_edge_bps: dec!(30),
            reverse_min_edge_bps: dec!(30),
            max_price_impact_bps: dec!(50),
            risk_buffer_bps: dec!(100),
            bridge_cost_usd: dec!(1.25),
            trades_per_bridge: 100,
            u_usd: Some(dec!(0.04)),
        };
        let sell = quote(VenueId::A, dec!(150));
        let edge = compute_edge(ArbDirection::Forward, &sell, dec!(140), dec!(200), dec!(5), &cfg);
        assert!(!edge.profitable);
    }
}
