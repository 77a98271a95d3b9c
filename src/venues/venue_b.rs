//! Venue B: Solana-style router aggregator simulator. Grounded on the
//! aggregator-side quote-fetch shape used by cross-chain detectors in the
//! reference pack (fixed effective rate plus a linear impact curve, in lieu
//! of modeling a real router's multi-hop split).

use super::{RouteSnapshot, VenueAdapter};
use crate::error::{AppError, AppResult};
use crate::types::{Direction, ExecResult, Quote, VenueId};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

pub struct VenueBSimulator {
    routes: DashMap<String, RouteSnapshot>,
    balances: DashMap<String, Decimal>,
}

impl VenueBSimulator {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            balances: DashMap::new(),
        }
    }

    pub fn seed_route(&self, symbol: &str, route: RouteSnapshot) {
        self.routes.insert(symbol.to_string(), route);
    }

    pub fn seed_balance(&self, symbol: &str, amount: Decimal) {
        self.balances.insert(symbol.to_string(), amount);
    }

    fn route_for(&self, symbol: &str) -> AppResult<RouteSnapshot> {
        self.routes
            .get(symbol)
            .map(|r| r.clone())
            .ok_or_else(|| AppError::execution(format!("no venue B route seeded for {symbol}")))
    }
}

impl Default for VenueBSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VenueAdapter for VenueBSimulator {
    async fn quote(&self, symbol: &str, size: Decimal, direction: Direction) -> AppResult<Quote> {
        // Same-mint degenerate case: a token quoted against itself is 1:1, zero impact.
        if symbol.eq_ignore_ascii_case("U") {
            let now = Utc::now();
            return Ok(Quote {
                symbol: symbol.to_string(),
                venue: VenueId::B,
                direction,
                price: Decimal::ONE,
                currency: "U".to_string(),
                trade_size: size,
                min_output: Some(size),
                price_impact_bps: Decimal::ZERO,
                provider_fee_hint: None,
                priority_fee_hint: None,
                pool_liquidity_hint: None,
                timestamp: now,
                expires_at: now + chrono::Duration::seconds(30),
                valid: true,
                error: None,
            });
        }

        let route = self.route_for(symbol)?;
        if route.rate_token_per_u.is_zero() || route.rate_token_per_u.is_sign_negative() {
            return Err(AppError::execution(format!("venue B route for {symbol} has a non-positive rate")));
        }
        let impact_bps = (route.impact_bps_per_unit * size).min(dec!(10000));
        let now = Utc::now();

        let (price, min_output) = match direction {
            Direction::Sell => {
                // Exact-in: token -> U. price = U per token.
                let rate_u_per_token = Decimal::ONE / route.rate_token_per_u;
                let gross_out = size * rate_u_per_token;
                let out = gross_out * (dec!(1) - impact_bps / dec!(10000));
                (out / size, Some(out))
            }
            Direction::Buy => {
                // Exact-out: U -> token, `size` is desired token amount.
                let gross_in = size * route.rate_token_per_u;
                let in_amount = gross_in * (dec!(1) + impact_bps / dec!(10000));
                (in_amount / size, Some(size))
            }
        };

        Ok(Quote {
            symbol: symbol.to_string(),
            venue: VenueId::B,
            direction,
            price,
            currency: "U".to_string(),
            trade_size: size,
            min_output,
            price_impact_bps: impact_bps,
            provider_fee_hint: None,
            priority_fee_hint: Some(dec!(0.00001)),
            pool_liquidity_hint: None,
            timestamp: now,
            expires_at: now + chrono::Duration::seconds(20),
            valid: true,
            error: None,
        })
    }

    async fn swap(
        &self,
        symbol: &str,
        size: Decimal,
        direction: Direction,
        limit: Decimal,
        _deadline_secs: u64,
    ) -> AppResult<ExecResult> {
        let quote = self.quote(symbol, size, direction).await?;
        match direction {
            Direction::Sell => {
                let out = quote.min_output.unwrap_or_default();
                if out < limit {
                    return Err(AppError::execution(format!(
                        "venue B sell slippage breach: out {out} < min_output {limit}"
                    )));
                }
            }
            Direction::Buy => {
                let in_amount = quote.price * size;
                if in_amount > limit {
                    return Err(AppError::execution(format!(
                        "venue B buy slippage breach: input {in_amount} > max_input {limit}"
                    )));
                }
            }
        }
        Ok(ExecResult {
            success: true,
            tx_id: Some(format!("simB-{symbol}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())),
            error: None,
        })
    }

    async fn fetch_balances(&self, _owner: &str) -> AppResult<HashMap<String, Decimal>> {
        Ok(self.balances.iter().map(|e| (e.key().clone(), *e.value())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_mint_quote_is_unity() {
        let sim = VenueBSimulator::new();
        let q = sim.quote("U", dec!(500), Direction::Sell).await.unwrap();
        assert_eq!(q.price, Decimal::ONE);
        assert_eq!(q.price_impact_bps, Decimal::ZERO);
    }

    #[tokio::test]
    async fn buy_quote_reflects_route_rate() {
        let sim = VenueBSimulator::new();
        sim.seed_route(
            "GALA",
            RouteSnapshot {
                rate_token_per_u: dec!(2.0),
                impact_bps_per_unit: dec!(0.01),
            },
        );
        let q = sim.quote("GALA", dec!(100), Direction::Buy).await.unwrap();
        assert!(q.price > Decimal::ZERO);
        assert!(q.satisfies_q1());
    }

    #[tokio::test]
    async fn negative_rate_route_is_rejected() {
        let sim = VenueBSimulator::new();
        sim.seed_route(
            "BAD",
            RouteSnapshot {
                rate_token_per_u: dec!(-1),
                impact_bps_per_unit: dec!(0),
            },
        );
        assert!(sim.quote("BAD", dec!(10), Direction::Sell).await.is_err());
    }
}
