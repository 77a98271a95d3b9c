//! Persistent state: inventory, cooldowns, bridge ledger, trade log.
//!
//! Single writer (the scheduler task), many readers. Mutations set a dirty
//! flag; a background task flushes to disk every 30s rather than on every
//! write, matching `SharedPoolState`'s write-then-rename pattern but batched
//! instead of per-update.

use crate::error::{AppError, AppResult};
use crate::types::{BridgeRecord, Cooldown, InventorySnapshot, LegState, TradeLogEntry};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// §6 state layout: `recentTrades` keeps only the last 100 entries in memory,
/// distinct from the unbounded daily JSONL append.
const RECENT_TRADES_CAP: usize = 100;

/// Everything persisted across restarts, as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub inventory: Option<InventorySnapshot>,
    pub inventory_version: u64,
    pub cooldowns: HashMap<String, Cooldown>,
    pub bridges: Vec<BridgeRecord>,
    pub bridge_daily_counts: HashMap<String, (chrono::NaiveDate, u32)>,
    pub last_bridge_at: HashMap<String, DateTime<Utc>>,
    pub recent_trades: Vec<TradeLogEntry>,
    pub daily_trade_counts: HashMap<String, (chrono::NaiveDate, u32)>,
    pub updated_at: DateTime<Utc>,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            inventory: None,
            inventory_version: 0,
            cooldowns: HashMap::new(),
            bridges: Vec::new(),
            bridge_daily_counts: HashMap::new(),
            last_bridge_at: HashMap::new(),
            recent_trades: Vec::new(),
            daily_trade_counts: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Derived from `recent_trades` (§4.1), grounded in
/// `paper_trading::metrics::TraderMetrics`'s win/loss aggregation, cut down to
/// what a single live bot (not a multi-config comparison) needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub successful_trades: usize,
    pub partial_trades: usize,
    pub failed_trades: usize,
    pub win_rate: Decimal,
    pub total_net_edge: Decimal,
    pub avg_net_edge_per_trade: Decimal,
    pub last_trade_at: Option<DateTime<Utc>>,
}

/// Owns `BotState`, flushes it atomically, and appends to the daily trade
/// log. Cloneable (`Arc` inside) so every component holds a handle.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<BotState>>,
    dirty: Arc<AtomicBool>,
    state_path: PathBuf,
    bridge_log_path: PathBuf,
    trades_dir: PathBuf,
}

impl StateStore {
    /// Load `state.json` from `data_dir` if present, else start fresh.
    /// A corrupt file is backed up to `state.json.corrupt` rather than
    /// aborting startup.
    pub fn load(data_dir: impl AsRef<Path>) -> AppResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| AppError::state("failed to create data dir").with_source(e))?;
        let state_path = data_dir.join("state.json");
        let bridge_log_path = data_dir.join("bridge-state.json");
        let trades_dir = data_dir.join("logs");
        std::fs::create_dir_all(&trades_dir)
            .map_err(|e| AppError::state("failed to create logs dir").with_source(e))?;

        let state = if state_path.exists() {
            match std::fs::read_to_string(&state_path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<BotState>(&raw).map_err(|e| e.to_string()))
            {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "state.json is corrupt, backing up and starting fresh");
                    let corrupt_path = data_dir.join("state.json.corrupt");
                    let _ = std::fs::rename(&state_path, &corrupt_path);
                    BotState::default()
                }
            }
        } else {
            info!("no existing state.json, starting fresh");
            BotState::default()
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
            dirty: Arc::new(AtomicBool::new(false)),
            state_path,
            bridge_log_path,
            trades_dir,
        })
    }

    pub async fn read_snapshot(&self) -> BotState {
        self.inner.read().await.clone()
    }

    pub async fn inventory(&self) -> Option<InventorySnapshot> {
        self.inner.read().await.inventory.clone()
    }

    /// Apply an inventory refresh, only if `new_version` moves the
    /// optimistic-concurrency counter forward (or equals the current
    /// version, for an idempotent re-read). Stale writes are dropped.
    pub async fn update_inventory(&self, snapshot: InventorySnapshot, new_version: u64) {
        let mut guard = self.inner.write().await;
        if new_version < guard.inventory_version {
            warn!(
                new_version,
                current_version = guard.inventory_version,
                "dropping stale inventory write"
            );
            return;
        }
        guard.inventory = Some(snapshot);
        guard.inventory_version = new_version;
        guard.updated_at = Utc::now();
        drop(guard);
        self.mark_dirty();
    }

    pub async fn set_cooldown(&self, symbol: &str, cooldown: Cooldown) {
        let mut guard = self.inner.write().await;
        guard.cooldowns.insert(symbol.to_string(), cooldown);
        drop(guard);
        self.mark_dirty();
    }

    pub async fn clear_cooldown(&self, symbol: &str) {
        let mut guard = self.inner.write().await;
        guard.cooldowns.remove(symbol);
        drop(guard);
        self.mark_dirty();
    }

    pub async fn cooldown(&self, symbol: &str) -> Option<Cooldown> {
        self.inner.read().await.cooldowns.get(symbol).cloned()
    }

    pub async fn append_bridge(&self, record: BridgeRecord) {
        let mut guard = self.inner.write().await;
        let today = Utc::now().date_naive();
        let entry = guard
            .bridge_daily_counts
            .entry(record.symbol.clone())
            .or_insert((today, 0));
        if entry.0 == today {
            entry.1 += 1;
        } else {
            *entry = (today, 1);
        }
        guard.last_bridge_at.insert(record.symbol.clone(), record.submitted_at);
        guard.bridges.push(record);
        drop(guard);
        self.mark_dirty();
        self.flush_bridge_log().await;
    }

    pub async fn update_bridge(&self, id: &str, status: crate::types::BridgeStatus, tx_hash: Option<String>) {
        let mut guard = self.inner.write().await;
        if let Some(b) = guard.bridges.iter_mut().find(|b| b.id == id) {
            b.status = status;
            if tx_hash.is_some() {
                b.tx_hash = tx_hash;
            }
        }
        drop(guard);
        self.mark_dirty();
        self.flush_bridge_log().await;
    }

    /// Bridges submitted today for `symbol`, per the daily rate limit.
    pub async fn bridges_today(&self, symbol: &str) -> u32 {
        let guard = self.inner.read().await;
        let today = Utc::now().date_naive();
        guard
            .bridge_daily_counts
            .get(symbol)
            .filter(|(date, _)| *date == today)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub async fn last_bridge_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_bridge_at.get(symbol).copied()
    }

    /// Append to `logs/trades-YYYY-MM-DD.jsonl`, one JSON object per line,
    /// retain it in the in-memory last-100 rolling window, and bump the
    /// per-symbol daily trade count used by the `max_daily_trades` limiter.
    pub async fn append_trade(&self, entry: &TradeLogEntry) -> AppResult<()> {
        let day = entry.timestamp.date_naive();
        let path = self.trades_dir.join(format!("trades-{day}.jsonl"));
        let line = serde_json::to_string(entry)
            .map_err(|e| AppError::state("failed to serialize trade log entry").with_source(e))?;
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::state("failed to open trade log").with_source(e))?;
        writeln!(file, "{line}").map_err(|e| AppError::state("failed to append trade log").with_source(e))?;

        let mut guard = self.inner.write().await;
        guard.recent_trades.push(entry.clone());
        if guard.recent_trades.len() > RECENT_TRADES_CAP {
            let overflow = guard.recent_trades.len() - RECENT_TRADES_CAP;
            guard.recent_trades.drain(0..overflow);
        }
        let today = Utc::now().date_naive();
        let count_entry = guard.daily_trade_counts.entry(entry.symbol.clone()).or_insert((today, 0));
        if count_entry.0 == today {
            count_entry.1 += 1;
        } else {
            *count_entry = (today, 1);
        }
        drop(guard);
        self.mark_dirty();
        Ok(())
    }

    /// Trades recorded for `symbol` on the current UTC day, for the
    /// `max_daily_trades` interlock (§4.8, §6 `dailyTradeCounts`).
    pub async fn daily_trade_count(&self, symbol: &str) -> u32 {
        let guard = self.inner.read().await;
        let today = Utc::now().date_naive();
        guard
            .daily_trade_counts
            .get(symbol)
            .filter(|(date, _)| *date == today)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Aggregates `recent_trades` into the summary `performance_metrics()`
    /// surfaces for the periodic operator log (§4.1).
    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        let guard = self.inner.read().await;
        let trades = &guard.recent_trades;
        let total_trades = trades.len();
        let mut successful_trades = 0;
        let mut partial_trades = 0;
        let mut failed_trades = 0;
        let mut total_net_edge = Decimal::ZERO;

        for trade in trades {
            let all_success = trade.legs.iter().all(|l| l.state == LegState::Success);
            let any_success = trade.legs.iter().any(|l| l.state == LegState::Success);
            if all_success {
                successful_trades += 1;
                total_net_edge += trade.expected_edge.net_edge;
            } else if any_success {
                partial_trades += 1;
            } else {
                failed_trades += 1;
            }
        }

        let win_rate = if total_trades > 0 {
            Decimal::from(successful_trades) / Decimal::from(total_trades)
        } else {
            Decimal::ZERO
        };
        let avg_net_edge_per_trade = if total_trades > 0 {
            total_net_edge / Decimal::from(total_trades)
        } else {
            Decimal::ZERO
        };

        PerformanceMetrics {
            total_trades,
            successful_trades,
            partial_trades,
            failed_trades,
            win_rate,
            total_net_edge,
            avg_net_edge_per_trade,
            last_trade_at: trades.last().map(|t| t.timestamp),
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    async fn flush_bridge_log(&self) {
        let guard = self.inner.read().await;
        let json = match serde_json::to_string_pretty(&guard.bridges) {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "failed to serialize bridge log");
                return;
            }
        };
        drop(guard);
        if let Err(e) = atomic_write(&self.bridge_log_path, &json) {
            error!(error = %e, "failed to flush bridge-state.json");
        }
    }

    async fn flush(&self) {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return;
        }
        let guard = self.inner.read().await;
        let json = match serde_json::to_string_pretty(&*guard) {
            Ok(j) => j,
            Err(e) => {
                error!(error = %e, "failed to serialize state.json");
                return;
            }
        };
        drop(guard);
        if let Err(e) = atomic_write(&self.state_path, &json) {
            error!(error = %e, "failed to flush state.json");
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    /// Spawn the background flush loop. Dropping the returned handle does
    /// not stop it; cancel via the shutdown token passed to the scheduler.
    pub fn spawn_flush_loop(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = interval.tick() => store.flush().await,
                    _ = shutdown.changed() => {
                        store.flush().await;
                        break;
                    }
                }
            }
        })
    }
}

fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, contents)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BridgeDirection, BridgeStatus};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn stale_inventory_write_is_dropped() {
        let dir = tempfile_data_dir();
        let store = StateStore::load(&dir).unwrap();
        let snap = InventorySnapshot {
            venue_a: crate::types::VenueInventory::empty(1, Utc::now()),
            venue_b: crate::types::VenueInventory::empty(1, Utc::now()),
            inventory_low: Default::default(),
            paused: Default::default(),
        };
        store.update_inventory(snap.clone(), 5).await;
        store.update_inventory(snap, 2).await;
        assert_eq!(store.read_snapshot().await.inventory_version, 5);
    }

    #[tokio::test]
    async fn bridge_daily_count_increments_same_day() {
        let dir = tempfile_data_dir();
        let store = StateStore::load(&dir).unwrap();
        let record = BridgeRecord {
            id: "b1".into(),
            symbol: "GALA".into(),
            amount: dec!(100),
            direction: BridgeDirection::AToB,
            tx_hash: None,
            submitted_at: Utc::now(),
            status: BridgeStatus::Pending,
            retry_count: 0,
        };
        store.append_bridge(record.clone()).await;
        store.append_bridge(BridgeRecord { id: "b2".into(), ..record }).await;
        assert_eq!(store.bridges_today("GALA").await, 2);
    }

    fn tempfile_data_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("dexarb-test-{}", uuid_like()));
        p
    }

    fn uuid_like() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
    }
}
