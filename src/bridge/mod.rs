//! BridgeController: imbalance detection, rate-limited rebalancing, and
//! status polling (§4.9). Grounded on
//! `arbitrage::cooldown::RouteCooldown`'s escalating-backoff-by-key shape
//! (generalized here to a flat per-token daily counter plus a single
//! cooldown, since the domain calls for rate limiting rather than
//! escalation) and the reference pack's `SynapseBridge` submit/poll split.

pub mod simulator;

pub use simulator::BridgeSimulator;

use crate::alerts::{AlertHub, AlertLevel};
use crate::config::RuntimeConfig;
use crate::error::ErrorCategory;
use crate::state::StateStore;
use crate::types::{BridgeDirection, BridgeRecord, BridgeStatus, InventorySnapshot};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Bridge-controller interface (§6): a real deployment implements this
/// against the chain's native bridge protocol; the shipped
/// [`BridgeSimulator`] stands in for wire submission and polling.
#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    async fn submit_bridge(&self, symbol: &str, amount: Decimal, direction: BridgeDirection) -> crate::error::AppResult<BridgeSubmission>;
    async fn status(&self, tx_id: &str) -> crate::error::AppResult<BridgeStatusReport>;
}

pub struct BridgeSubmission {
    pub tx_id: String,
}

pub struct BridgeStatusReport {
    pub code: u32,
    pub description: String,
}

pub struct BridgeController {
    adapter: Arc<dyn BridgeAdapter>,
    state: Arc<StateStore>,
    alerts: Arc<AlertHub>,
    id_seq: AtomicU64,
}

impl BridgeController {
    pub fn new(adapter: Arc<dyn BridgeAdapter>, state: Arc<StateStore>, alerts: Arc<AlertHub>) -> Self {
        Self {
            adapter,
            state,
            alerts,
            id_seq: AtomicU64::new(1),
        }
    }

    fn next_id(&self, symbol: &str) -> String {
        let seq = self.id_seq.fetch_add(1, Ordering::Relaxed);
        format!("bridge-{symbol}-{}-{seq}", Utc::now().timestamp_millis())
    }

    /// One pass over every enabled, non-skip-listed token (§4.9 steps 1-7).
    /// `inventory` is the snapshot the caller already acquired this tick.
    pub async fn run_cycle(&self, config: &RuntimeConfig, inventory: &InventorySnapshot) {
        if !config.auto_bridging_enabled {
            return;
        }

        for token in &config.tokens {
            if !token.enabled || config.bridge_skip_tokens.contains(&token.symbol) {
                continue;
            }
            if !config.bridge_enabled_tokens.is_empty() && !config.bridge_enabled_tokens.contains(&token.symbol) {
                continue;
            }
            self.evaluate_token(&token.symbol, config, inventory).await;
        }
    }

    async fn evaluate_token(&self, symbol: &str, config: &RuntimeConfig, inventory: &InventorySnapshot) {
        let bal_a = inventory.venue_a.total_for(symbol);
        let bal_b = inventory.venue_b.total_for(symbol);
        let total = bal_a + bal_b;
        if total.is_zero() {
            return;
        }

        let pct_a = bal_a / total * dec!(100);
        let pct_b = bal_b / total * dec!(100);
        let threshold = config.imbalance_threshold_percent;
        let target_split = config.target_split_percent / dec!(100);

        let (direction, amount) = if pct_a > threshold && pct_b < dec!(100) - threshold {
            (BridgeDirection::AToB, bal_a - target_split * total)
        } else if pct_b > threshold && pct_a < dec!(100) - threshold {
            (BridgeDirection::BToA, bal_b - target_split * total)
        } else {
            return;
        };

        if amount < config.min_rebalance_amount {
            return;
        }

        if self.state.bridges_today(symbol).await >= config.max_bridges_per_day {
            info!(symbol, "bridge skipped: daily limit reached");
            return;
        }
        if let Some(last) = self.state.last_bridge_at(symbol).await {
            let ready_at = last + ChronoDuration::minutes(config.bridge_cooldown_minutes);
            if Utc::now() < ready_at {
                info!(symbol, %ready_at, "bridge skipped: cooldown active");
                return;
            }
        }

        self.submit(symbol, amount, direction).await;
    }

    async fn submit(&self, symbol: &str, amount: Decimal, direction: BridgeDirection) {
        match self.adapter.submit_bridge(symbol, amount, direction).await {
            Ok(submission) => {
                let record = BridgeRecord {
                    id: self.next_id(symbol),
                    symbol: symbol.to_string(),
                    amount,
                    direction,
                    tx_hash: Some(submission.tx_id),
                    submitted_at: Utc::now(),
                    status: BridgeStatus::Pending,
                    retry_count: 0,
                };
                info!(symbol, %direction, %amount, "bridge submitted");
                self.state.append_bridge(record).await;
            }
            Err(e) => {
                warn!(symbol, error = %e, "bridge submission failed");
                self.alerts
                    .alert(
                        "bridge submission failed",
                        json!({"symbol": symbol, "direction": direction.to_string(), "amount": amount.to_string(), "error": e.to_string()}),
                        AlertLevel::Error,
                    )
                    .await;
            }
        }
    }

    /// Polls every bridge currently Pending in state once. Intended to be
    /// driven by the scheduler on a 15 s cadence (§5); does not itself sleep.
    pub async fn poll_pending(&self, config: &RuntimeConfig) {
        let pending: Vec<BridgeRecord> = self
            .state
            .read_snapshot()
            .await
            .bridges
            .into_iter()
            .filter(|b| b.status == BridgeStatus::Pending)
            .collect();

        for record in pending {
            self.poll_one(record, config).await;
        }
    }

    async fn poll_one(&self, record: BridgeRecord, config: &RuntimeConfig) {
        let Some(tx_id) = record.tx_hash.clone() else {
            return;
        };
        let age = Utc::now().signed_duration_since(record.submitted_at);
        if age > ChronoDuration::minutes(config.bridge_timeout_minutes) {
            warn!(symbol = %record.symbol, "bridge timed out waiting for status");
            self.state.update_bridge(&record.id, BridgeStatus::Failed, Some(tx_id)).await;
            self.alerts
                .alert(
                    "bridge timed out",
                    json!({"symbol": record.symbol, "id": record.id}),
                    AlertLevel::Error,
                )
                .await;
            return;
        }

        match self.adapter.status(&tx_id).await {
            Ok(report) if report.code == 5 => {
                info!(symbol = %record.symbol, "bridge confirmed");
                self.state.update_bridge(&record.id, BridgeStatus::Confirmed, Some(tx_id)).await;
            }
            Ok(report) if report.code > 5 => {
                warn!(symbol = %record.symbol, code = report.code, description = %report.description, "bridge failed terminally");
                self.state.update_bridge(&record.id, BridgeStatus::Failed, Some(tx_id)).await;
                self.alerts
                    .alert(
                        "bridge failed",
                        json!({"symbol": record.symbol, "id": record.id, "code": report.code, "description": report.description}),
                        AlertLevel::Error,
                    )
                    .await;
            }
            Ok(_) => {
                // code < 5 or 404: still in flight, poll again next cycle.
            }
            Err(e) if matches!(e.category, ErrorCategory::Network | ErrorCategory::ExternalApi) => {
                warn!(symbol = %record.symbol, error = %e, "bridge status check failed, will retry next cycle");
            }
            Err(e) => {
                warn!(symbol = %record.symbol, error = %e, "bridge status check failed terminally");
                self.state.update_bridge(&record.id, BridgeStatus::Failed, Some(tx_id)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceRow, VenueInventory};
    use std::collections::{HashMap, HashSet};

    fn inventory(symbol: &str, a: Decimal, b: Decimal) -> InventorySnapshot {
        let mut venue_a = VenueInventory::empty(1, Utc::now());
        let mut venue_b = VenueInventory::empty(1, Utc::now());
        venue_a.balances.insert(
            symbol.to_string(),
            BalanceRow {
                raw_balance: a,
                human_balance: a,
                decimals: 8,
                usd_value: Decimal::ZERO,
                last_updated: Utc::now(),
            },
        );
        venue_b.balances.insert(
            symbol.to_string(),
            BalanceRow {
                raw_balance: b,
                human_balance: b,
                decimals: 8,
                usd_value: Decimal::ZERO,
                last_updated: Utc::now(),
            },
        );
        InventorySnapshot {
            venue_a,
            venue_b,
            inventory_low: HashSet::new(),
            paused: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn imbalanced_token_triggers_bridge_submission() {
        let dir = std::env::temp_dir().join(format!("dexarb-bridge-{}", std::process::id()));
        let state = Arc::new(StateStore::load(&dir).unwrap());
        let adapter: Arc<dyn BridgeAdapter> = Arc::new(BridgeSimulator::new());
        let alerts = Arc::new(AlertHub::new(vec![]));
        let controller = BridgeController::new(adapter, Arc::clone(&state), alerts);

        let mut cfg = RuntimeConfig::test_default();
        cfg.auto_bridging_enabled = true;
        cfg.imbalance_threshold_percent = dec!(80);
        cfg.target_split_percent = dec!(50);
        cfg.min_rebalance_amount = dec!(10);

        let inv = inventory("GALA", dec!(9000), dec!(1000));
        controller.run_cycle(&cfg, &inv).await;

        assert_eq!(state.bridges_today("GALA").await, 1);
    }

    #[tokio::test]
    async fn balanced_token_does_not_bridge() {
        let dir = std::env::temp_dir().join(format!("dexarb-bridge2-{}", std::process::id()));
        let state = Arc::new(StateStore::load(&dir).unwrap());
        let adapter: Arc<dyn BridgeAdapter> = Arc::new(BridgeSimulator::new());
        let alerts = Arc::new(AlertHub::new(vec![]));
        let controller = BridgeController::new(adapter, Arc::clone(&state), alerts);

        let mut cfg = RuntimeConfig::test_default();
        cfg.auto_bridging_enabled = true;

        let inv = inventory("GALA", dec!(5000), dec!(5000));
        controller.run_cycle(&cfg, &inv).await;

        assert_eq!(state.bridges_today("GALA").await, 0);
    }

    #[tokio::test]
    async fn pending_bridge_resolves_to_confirmed_after_polls() {
        let dir = std::env::temp_dir().join(format!("dexarb-bridge3-{}", std::process::id()));
        let state = Arc::new(StateStore::load(&dir).unwrap());
        let adapter: Arc<dyn BridgeAdapter> = Arc::new(BridgeSimulator::new());
        let alerts = Arc::new(AlertHub::new(vec![]));
        let controller = BridgeController::new(Arc::clone(&adapter), Arc::clone(&state), alerts);
        let cfg = RuntimeConfig::test_default();

        let submission = adapter.submit_bridge("GALA", dec!(100), BridgeDirection::AToB).await.unwrap();
        state
            .append_bridge(BridgeRecord {
                id: "test-1".into(),
                symbol: "GALA".into(),
                amount: dec!(100),
                direction: BridgeDirection::AToB,
                tx_hash: Some(submission.tx_id),
                submitted_at: Utc::now(),
                status: BridgeStatus::Pending,
                retry_count: 0,
            })
            .await;

        controller.poll_pending(&cfg).await;
        controller.poll_pending(&cfg).await;

        let snap = state.read_snapshot().await;
        let record = snap.bridges.iter().find(|b| b.id == "test-1").unwrap();
        assert_eq!(record.status, BridgeStatus::Confirmed);
    }
}
