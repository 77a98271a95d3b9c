//! Per-chain inventory snapshots, inventory-low carve-out, USD valuation,
//! RPC-storm guard (§4.6). Grounded on `data_collector::shared_state`'s
//! staleness tracking, generalized from pool reserves to token balances.

use crate::config::RuntimeConfig;
use crate::rate_resolver::RateResolver;
use crate::state::StateStore;
use crate::types::{BalanceRow, Direction, InventorySnapshot, VenueInventory};
use crate::venues::VenueAdapter;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

const BALANCE_CHECK_COOLDOWN_SECS: i64 = 60;

pub struct BalanceChecker {
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    owner_a: String,
    owner_b: String,
    state: Arc<StateStore>,
    last_checked_unix: AtomicI64,
    cached: tokio::sync::RwLock<Option<InventorySnapshot>>,
}

impl BalanceChecker {
    pub fn new(venue_a: Arc<dyn VenueAdapter>, venue_b: Arc<dyn VenueAdapter>, owner_a: String, owner_b: String, state: Arc<StateStore>) -> Self {
        Self {
            venue_a,
            venue_b,
            owner_a,
            owner_b,
            state,
            last_checked_unix: AtomicI64::new(0),
            cached: tokio::sync::RwLock::new(None),
        }
    }

    /// Refreshes the cached snapshot unless within the cooldown window and
    /// `force` is false, in which case the previous snapshot is returned
    /// (an RPC-storm guard, not a correctness requirement).
    pub async fn snapshot(&self, config: &RuntimeConfig, rate_resolver: &RateResolver, force: bool) -> InventorySnapshot {
        let now = Utc::now().timestamp();
        let last = self.last_checked_unix.load(Ordering::Relaxed);
        if !force && now - last < BALANCE_CHECK_COOLDOWN_SECS {
            if let Some(cached) = self.cached.read().await.clone() {
                return cached;
            }
        }

        let raw_a = self.venue_a.fetch_balances(&self.owner_a).await.unwrap_or_else(|e| {
            warn!(error = %e, "venue A balance fetch failed, using empty balances");
            HashMap::new()
        });
        let raw_b = self.venue_b.fetch_balances(&self.owner_b).await.unwrap_or_else(|e| {
            warn!(error = %e, "venue B balance fetch failed, using empty balances");
            HashMap::new()
        });

        let version = self.last_checked_unix.fetch_add(0, Ordering::Relaxed) as u64 + 1;
        let mut venue_a_inv = VenueInventory::empty(version, Utc::now());
        let mut venue_b_inv = VenueInventory::empty(version, Utc::now());
        let mut inventory_low = HashSet::new();
        let mut paused = HashSet::new();

        for token in &config.tokens {
            if !token.enabled {
                continue;
            }
            let bal_a = raw_a.get(&token.symbol).copied().unwrap_or(Decimal::ZERO);
            let bal_b = raw_b.get(&token.symbol).copied().unwrap_or(Decimal::ZERO);

            let usd_a = self.usd_value(&token.symbol, bal_a, rate_resolver, config).await;
            let usd_b = self.usd_value(&token.symbol, bal_b, rate_resolver, config).await;

            venue_a_inv.balances.insert(
                token.symbol.clone(),
                BalanceRow {
                    raw_balance: bal_a,
                    human_balance: bal_a,
                    decimals: token.decimals,
                    usd_value: usd_a,
                    last_updated: Utc::now(),
                },
            );
            venue_b_inv.balances.insert(
                token.symbol.clone(),
                BalanceRow {
                    raw_balance: bal_b,
                    human_balance: bal_b,
                    decimals: token.decimals,
                    usd_value: usd_b,
                    last_updated: Utc::now(),
                },
            );
            venue_a_inv.chain_usd_total += usd_a;
            venue_b_inv.chain_usd_total += usd_b;

            if let Some(target) = token.inventory_target {
                let total = bal_a + bal_b;
                if total < target * dec!(0.8) {
                    inventory_low.insert(token.symbol.clone());
                }
            }

            // §4.6: sell-side shortfalls fall under the inventory-low carve-out
            // above (the coordinator skips the sell leg instead); only the
            // buy-side funding requirement — U on chain A to buy in reverse,
            // counter-asset on chain B to buy in forward — actually pauses
            // the token, since there is no partial-leg path for a buy.
            if config.enable_reverse {
                if let Some(required_u) = self.required_buy_funds(&self.venue_a, &token.symbol, token.trade_size).await {
                    let held_u = raw_a.get("U").copied().unwrap_or(Decimal::ZERO);
                    if held_u < required_u {
                        warn!(symbol = %token.symbol, held = %held_u, required = %required_u, "insufficient U on chain A for reverse buy leg, pausing token");
                        paused.insert(token.symbol.clone());
                    }
                }
            }
            if let Some(required_counter) = self.required_buy_funds(&self.venue_b, &token.symbol, token.trade_size).await {
                let held_counter = raw_b.get(&token.quote_via_b).copied().unwrap_or(Decimal::ZERO);
                if held_counter < required_counter {
                    warn!(symbol = %token.symbol, held = %held_counter, required = %required_counter, counter = %token.quote_via_b, "insufficient counter-asset on chain B for forward buy leg, pausing token");
                    paused.insert(token.symbol.clone());
                }
            }
        }

        let snapshot = InventorySnapshot {
            venue_a: venue_a_inv,
            venue_b: venue_b_inv,
            inventory_low,
            paused,
        };

        // §3: "InventorySnapshot is updated by BalanceChecker" — both chain
        // inventories were stamped with the same `version` above, so either
        // one's counter is the snapshot's version for the optimistic write.
        self.state.update_inventory(snapshot.clone(), version).await;

        *self.cached.write().await = Some(snapshot.clone());
        self.last_checked_unix.store(now, Ordering::Relaxed);
        snapshot
    }

    /// Quotes the funding currency cost of buying `trade_size` of `symbol` on
    /// `adapter` (§4.6 "Required on chain A/B"). `None` means the quote
    /// failed and the requirement can't be estimated this cycle; callers
    /// treat that as "don't pause on missing data".
    async fn required_buy_funds(&self, adapter: &Arc<dyn VenueAdapter>, symbol: &str, trade_size: Decimal) -> Option<Decimal> {
        match adapter.quote(symbol, trade_size, Direction::Buy).await {
            Ok(quote) if quote.valid => Some(quote.price * trade_size),
            Ok(_) => None,
            Err(e) => {
                warn!(symbol, error = %e, "buy-funding quote failed, skipping pause check this cycle");
                None
            }
        }
    }

    async fn usd_value(&self, symbol: &str, amount: Decimal, rate_resolver: &RateResolver, config: &RuntimeConfig) -> Decimal {
        if symbol.eq_ignore_ascii_case("U") {
            return amount * config.u_usd_fallback;
        }
        match rate_resolver.resolve(symbol, amount, None).await {
            Some(r) if !r.rate.is_zero() => amount / r.rate * config.u_usd_fallback,
            _ => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venues::{VenueASimulator, VenueBSimulator};

    fn tempfile_data_dir(tag: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("dexarb-balcheck-{tag}-{}", std::process::id()));
        p
    }

    #[tokio::test]
    async fn empty_balances_yield_zero_totals() {
        let state = Arc::new(crate::state::StateStore::load(tempfile_data_dir("empty")).unwrap());
        let checker = BalanceChecker::new(
            Arc::new(VenueASimulator::new()),
            Arc::new(VenueBSimulator::new()),
            "ownerA".into(),
            "ownerB".into(),
            state,
        );
        let resolver = RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.01));
        let cfg = RuntimeConfig::test_default();
        let snap = checker.snapshot(&cfg, &resolver, true).await;
        assert_eq!(snap.venue_a.chain_usd_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn snapshot_is_persisted_to_state_store() {
        let state = Arc::new(crate::state::StateStore::load(tempfile_data_dir("persist")).unwrap());
        let checker = BalanceChecker::new(
            Arc::new(VenueASimulator::new()),
            Arc::new(VenueBSimulator::new()),
            "ownerA".into(),
            "ownerB".into(),
            Arc::clone(&state),
        );
        let resolver = RateResolver::new(Arc::new(VenueASimulator::new()), dec!(0.01));
        let cfg = RuntimeConfig::test_default();
        checker.snapshot(&cfg, &resolver, true).await;
        assert!(state.inventory().await.is_some());
    }
}
