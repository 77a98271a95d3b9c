//! Resolves a quote's counter-currency into units of U (§4.3). Grounded on
//! the dex-then-USD-anchor fallback chain used by cross-chain price feeds in
//! the reference pack, generalized into direct/pool/usd priority.

use crate::error::AppResult;
use crate::venues::VenueAdapter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Direct,
    Pool,
    Usd,
}

#[derive(Debug, Clone)]
pub struct ResolvedRate {
    pub rate: Decimal,
    pub source: RateSource,
    pub degraded: bool,
}

pub struct RateResolver {
    venue_a: Arc<dyn VenueAdapter>,
    u_usd_fallback: Decimal,
    degraded_usd_fallback_total: AtomicU64,
}

impl RateResolver {
    pub fn new(venue_a: Arc<dyn VenueAdapter>, u_usd_fallback: Decimal) -> Self {
        Self {
            venue_a,
            u_usd_fallback,
            degraded_usd_fallback_total: AtomicU64::new(0),
        }
    }

    pub fn degraded_usd_fallback_total(&self) -> u64 {
        self.degraded_usd_fallback_total.load(Ordering::Relaxed)
    }

    /// `counter` is the currency to convert into U; `size` is the trade size
    /// on the quote side, used for the pool-quote lookup. Invariant R1: never
    /// returns zero, NaN, or negative; a resolution failure is `None`.
    pub async fn resolve(
        &self,
        counter: &str,
        size: Decimal,
        counter_usd: Option<Decimal>,
    ) -> Option<ResolvedRate> {
        if counter.eq_ignore_ascii_case("U") {
            return Some(ResolvedRate {
                rate: Decimal::ONE,
                source: RateSource::Direct,
                degraded: false,
            });
        }

        if let Ok(quote) = self
            .venue_a
            .quote(counter, size, crate::types::Direction::Sell)
            .await
        {
            if quote.valid && quote.price.is_sign_positive() && !quote.price.is_zero() {
                return Some(ResolvedRate {
                    rate: quote.price,
                    source: RateSource::Pool,
                    degraded: false,
                });
            }
        }

        let u_usd = if self.u_usd_fallback.is_zero() {
            warn!("no configured U_usd for USD-anchor fallback; using degraded default");
            self.degraded_usd_fallback_total.fetch_add(1, Ordering::Relaxed);
            dec!(0.01)
        } else {
            self.u_usd_fallback
        };

        match counter_usd {
            Some(c_usd) if c_usd.is_sign_positive() && !c_usd.is_zero() => Some(ResolvedRate {
                rate: c_usd / u_usd,
                source: RateSource::Usd,
                degraded: false,
            }),
            _ => None,
        }
    }
}

pub type RateResolverResult = AppResult<ResolvedRate>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::VenueASimulator;

    #[tokio::test]
    async fn direct_rate_for_u_is_one() {
        let resolver = RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.01));
        let r = resolver.resolve("U", dec!(100), None).await.unwrap();
        assert_eq!(r.rate, Decimal::ONE);
        assert_eq!(r.source, RateSource::Direct);
    }

    #[tokio::test]
    async fn usd_fallback_used_when_no_pool_and_counter_usd_given() {
        let resolver = RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.04));
        let r = resolver.resolve("S", dec!(10), Some(dec!(112))).await.unwrap();
        assert_eq!(r.source, RateSource::Usd);
        assert_eq!(r.rate, dec!(112) / dec!(0.04));
    }

    #[tokio::test]
    async fn resolution_fails_cleanly_with_no_data() {
        let resolver = RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.01));
        assert!(resolver.resolve("NOPE", dec!(10), None).await.is_none());
    }
}
