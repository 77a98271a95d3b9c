//! Venue A: GalaChain-style AMM simulator. Constant-product math is adapted
//! from `pool::calculator::PriceCalculator::get_amount_out/get_amount_in`,
//! generalized from `U256` to `Decimal` and from a fixed 0.3% fee to a
//! per-pool `fee_bps`.

use super::{PoolSnapshot, VenueAdapter};
use crate::error::{AppError, AppResult};
use crate::types::{Direction, ExecResult, Quote, VenueId};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

const MIN_ACTIVE_LIQUIDITY: Decimal = dec!(1000);
const REVERSE_HEADROOM_BPS: Decimal = dec!(1000); // 10%

pub struct VenueASimulator {
    pools: DashMap<String, PoolSnapshot>,
    balances: DashMap<String, Decimal>,
}

impl VenueASimulator {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            balances: DashMap::new(),
        }
    }

    pub fn seed_pool(&self, symbol: &str, pool: PoolSnapshot) {
        self.pools.insert(symbol.to_string(), pool);
    }

    pub fn seed_balance(&self, symbol: &str, amount: Decimal) {
        self.balances.insert(symbol.to_string(), amount);
    }

    fn get_amount_out(amount_in: Decimal, reserve_in: Decimal, reserve_out: Decimal, fee_bps: Decimal) -> Decimal {
        if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
            return Decimal::ZERO;
        }
        let fee_mult = (dec!(10000) - fee_bps) / dec!(10000);
        let amount_in_with_fee = amount_in * fee_mult;
        (amount_in_with_fee * reserve_out) / (reserve_in + amount_in_with_fee)
    }

    fn get_amount_in(amount_out: Decimal, reserve_in: Decimal, reserve_out: Decimal, fee_bps: Decimal) -> AppResult<Decimal> {
        if amount_out.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
            return Ok(Decimal::ZERO);
        }
        if amount_out >= reserve_out {
            return Err(AppError::execution("insufficient liquidity for exact-output request"));
        }
        let fee_mult = (dec!(10000) - fee_bps) / dec!(10000);
        Ok((amount_out * reserve_in) / ((reserve_out - amount_out) * fee_mult))
    }

    fn price_impact_bps(amount_in: Decimal, reserve_in: Decimal, reserve_out: Decimal, fee_bps: Decimal) -> Decimal {
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return dec!(10000);
        }
        let spot = reserve_out / reserve_in;
        let out = Self::get_amount_out(amount_in, reserve_in, reserve_out, fee_bps);
        if out.is_zero() {
            return dec!(10000);
        }
        let execution_price = out / amount_in;
        ((spot - execution_price) / spot).abs() * dec!(10000)
    }

    fn pool_for(&self, symbol: &str) -> AppResult<PoolSnapshot> {
        self.pools
            .get(symbol)
            .map(|p| p.clone())
            .ok_or_else(|| AppError::execution(format!("no venue A pool seeded for {symbol}")))
    }
}

impl Default for VenueASimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VenueAdapter for VenueASimulator {
    async fn quote(&self, symbol: &str, size: Decimal, direction: Direction) -> AppResult<Quote> {
        let pool = self.pool_for(symbol)?;
        if pool.active_liquidity < MIN_ACTIVE_LIQUIDITY {
            return Err(AppError::execution(format!(
                "venue A liquidity hint below minimum for {symbol}: {} < {MIN_ACTIVE_LIQUIDITY}",
                pool.active_liquidity
            )));
        }

        let now = Utc::now();
        let (price, min_output, impact_bps) = match direction {
            Direction::Sell => {
                // Exact-input: token -> U.
                let out = Self::get_amount_out(size, pool.reserve_token, pool.reserve_u, pool.fee_bps);
                if out.is_zero() {
                    return Err(AppError::execution("venue A sell quote produced zero output"));
                }
                let impact = Self::price_impact_bps(size, pool.reserve_token, pool.reserve_u, pool.fee_bps);
                (out / size, Some(out), impact)
            }
            Direction::Buy => {
                // Exact-output: U -> token, `size` is desired token amount.
                match Self::get_amount_in(size, pool.reserve_u, pool.reserve_token, pool.fee_bps) {
                    Ok(amount_in) if !amount_in.is_zero() => {
                        let impact = Self::price_impact_bps(amount_in, pool.reserve_u, pool.reserve_token, pool.fee_bps);
                        (amount_in / size, Some(size), impact)
                    }
                    _ => {
                        // Exact-output unavailable: estimate via a small forward quote,
                        // scale to desired, add 10% headroom, then re-quote exact-input.
                        let probe_in = pool.reserve_u / dec!(1000);
                        let probe_out = Self::get_amount_out(probe_in, pool.reserve_u, pool.reserve_token, pool.fee_bps);
                        if probe_out.is_zero() {
                            return Err(AppError::execution("venue A reverse-quote estimation failed"));
                        }
                        let implied_rate = probe_in / probe_out;
                        let estimated_in = size * implied_rate * (dec!(1) + REVERSE_HEADROOM_BPS / dec!(10000));
                        let actual_out = Self::get_amount_out(estimated_in, pool.reserve_u, pool.reserve_token, pool.fee_bps);
                        if actual_out.is_zero() {
                            return Err(AppError::execution("venue A reverse-quote re-quote failed"));
                        }
                        let impact = Self::price_impact_bps(estimated_in, pool.reserve_u, pool.reserve_token, pool.fee_bps);
                        (estimated_in / size, Some(size), impact)
                    }
                }
            }
        };

        Ok(Quote {
            symbol: symbol.to_string(),
            venue: VenueId::A,
            direction,
            price,
            currency: "U".to_string(),
            trade_size: size,
            min_output,
            price_impact_bps: impact_bps,
            provider_fee_hint: Some(pool.fee_bps),
            priority_fee_hint: None,
            pool_liquidity_hint: Some(pool.active_liquidity),
            timestamp: now,
            expires_at: now + chrono::Duration::seconds(30),
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
                        "venue A sell slippage breach: out {out} < min_output {limit}"
                    )));
                }
            }
            Direction::Buy => {
                let in_amount = quote.price * size;
                if in_amount > limit {
                    return Err(AppError::execution(format!(
                        "venue A buy slippage breach: input {in_amount} > max_input {limit}"
                    )));
                }
            }
        }
        Ok(ExecResult {
            success: true,
            tx_id: Some(format!("simA-{symbol}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())),
            error: None,
        })
    }

    async fn fetch_balances(&self, _owner: &str) -> AppResult<HashMap<String, Decimal>> {
        Ok(self.balances.iter().map(|e| (e.key().clone(), *e.value())).collect())
    }
}

/// Precision-buffer adjustment for venue-A reverse exact-output execution
/// (§4.2): subtract a slippage-sized buffer plus one smallest unit, floor to
/// `decimals`, clamp >= 0.
pub fn reverse_precision_buffer(desired: Decimal, dyn_slippage_bps: Decimal, decimals: u32) -> Decimal {
    let buffer_bps = dyn_slippage_bps.max(dec!(50));
    let buffered = desired * (dec!(1) - buffer_bps / dec!(10000));
    let smallest_unit = Decimal::new(1, decimals);
    let adjusted = buffered - smallest_unit;
    let rounded = adjusted.round_dp(decimals);
    rounded.max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> PoolSnapshot {
        PoolSnapshot {
            reserve_token: dec!(1_000_000),
            reserve_u: dec!(500_000),
            fee_bps: dec!(30),
            active_liquidity: dec!(100_000),
        }
    }

    #[tokio::test]
    async fn sell_quote_reports_positive_price() {
        let sim = VenueASimulator::new();
        sim.seed_pool("GALA", sample_pool());
        let q = sim.quote("GALA", dec!(1000), Direction::Sell).await.unwrap();
        assert!(q.price.is_sign_positive());
        assert!(q.satisfies_q1());
    }

    #[tokio::test]
    async fn liquidity_below_minimum_is_refused() {
        let sim = VenueASimulator::new();
        sim.seed_pool(
            "GALA",
            PoolSnapshot {
                active_liquidity: dec!(500),
                ..sample_pool()
            },
        );
        assert!(sim.quote("GALA", dec!(10), Direction::Sell).await.is_err());
    }

    #[test]
    fn reverse_precision_buffer_is_nonnegative_and_floored() {
        let buf = reverse_precision_buffer(dec!(100), dec!(40), 4);
        assert!(buf >= Decimal::ZERO);
        assert!(buf < dec!(100));
    }
}
