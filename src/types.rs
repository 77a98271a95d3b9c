//! Core data model: tokens, quotes, edges, inventory, cooldowns, bridge
//! records, and trade log entries.
//!
//! All monetary and inventory quantities are `rust_decimal::Decimal`.
//! `f64` only appears where spec §9 allows it: circuit-breaker timings and
//! percentage thresholds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two venues a quote, leg, or balance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueId {
    A,
    B,
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueId::A => write!(f, "A"),
            VenueId::B => write!(f, "B"),
        }
    }
}

impl VenueId {
    pub fn other(self) -> VenueId {
        match self {
            VenueId::A => VenueId::B,
            VenueId::B => VenueId::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sell,
    Buy,
}

/// The arbitrage direction: which venue sells, which buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbDirection {
    /// Sell on A, buy on B.
    Forward,
    /// Buy on A, sell on B.
    Reverse,
}

impl fmt::Display for ArbDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbDirection::Forward => write!(f, "forward"),
            ArbDirection::Reverse => write!(f, "reverse"),
        }
    }
}

impl ArbDirection {
    pub fn sell_side(self) -> VenueId {
        match self {
            ArbDirection::Forward => VenueId::A,
            ArbDirection::Reverse => VenueId::B,
        }
    }

    pub fn buy_side(self) -> VenueId {
        self.sell_side().other()
    }
}

/// How a candidate direction was selected at config time (`arbitrage_direction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionPriority {
    Forward,
    Reverse,
    Best,
}

/// GalaChain-style token class key: collection|category|type|additionalKey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueATokenId {
    pub collection: String,
    pub category: String,
    pub type_: String,
    pub additional_key: String,
}

impl fmt::Display for VenueATokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.collection, self.category, self.type_, self.additional_key
        )
    }
}

/// Solana-style base58 mint address. Validation is limited to the base58
/// alphabet and length bounds; signing/RPC concerns are out of scope (§1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueBTokenId(pub String);

impl fmt::Display for VenueBTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

impl VenueBTokenId {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if !(32..=44).contains(&raw.len()) {
            return Err(format!(
                "mint address length {} outside expected 32..=44",
                raw.len()
            ));
        }
        if !raw.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Err(format!("mint address '{raw}' contains non-base58 characters"));
        }
        Ok(Self(raw.to_string()))
    }
}

/// Immutable per-token configuration, created at config load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    pub venue_a_id: VenueATokenId,
    pub venue_b_id: VenueBTokenId,
    pub decimals: u8,
    pub trade_size: Decimal,
    pub enabled: bool,
    pub quote_via_a: String,
    pub quote_via_b: String,
    pub inventory_target: Option<Decimal>,
    #[serde(default)]
    pub strategies: Vec<StrategySpec>,
}

/// One entry of the optional per-token strategy table (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub strategy_id: String,
    pub venue_a_op: Direction,
    pub venue_a_counter: String,
    pub venue_b_op: Direction,
    pub venue_b_counter: String,
    pub enabled: bool,
    pub min_edge_bps: Decimal,
    pub priority: u32,
}

/// A size-aware price quote from one venue, one direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub venue: VenueId,
    pub direction: Direction,
    pub price: Decimal,
    pub currency: String,
    pub trade_size: Decimal,
    pub min_output: Option<Decimal>,
    pub price_impact_bps: Decimal,
    pub provider_fee_hint: Option<Decimal>,
    pub priority_fee_hint: Option<Decimal>,
    pub pool_liquidity_hint: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
    pub error: Option<String>,
}

impl Quote {
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_window_secs: i64) -> bool {
        (now - self.timestamp).num_seconds() <= stale_window_secs
    }

    /// Invariant Q1.
    pub fn satisfies_q1(&self) -> bool {
        self.valid && self.price.is_sign_positive() && !self.price.is_zero()
    }
}

/// Universal, direction-agnostic accounting result, expressed in U.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeResult {
    pub symbol: String,
    pub direction: ArbDirection,
    pub income: Decimal,
    pub expense: Decimal,
    pub bridge_cost: Decimal,
    pub risk_buffer: Decimal,
    pub total_cost: Decimal,
    pub net_edge: Decimal,
    pub net_edge_bps: Decimal,
    pub sell_side: VenueId,
    pub buy_side: VenueId,
    pub impact_bps_a: Decimal,
    pub impact_bps_b: Decimal,
    pub profitable: bool,
    pub invalidations: Vec<String>,
}

impl EdgeResult {
    /// Invariant E2.
    pub fn sides_distinct(&self) -> bool {
        self.sell_side != self.buy_side
    }

    /// Invariant E3.
    pub fn sides_match_direction(&self) -> bool {
        self.sell_side == self.direction.sell_side() && self.buy_side == self.direction.buy_side()
    }
}

/// One row of an InventorySnapshot: a single token's balance on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRow {
    pub raw_balance: Decimal,
    pub human_balance: Decimal,
    pub decimals: u8,
    pub usd_value: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Per-venue balance snapshot, monotonically versioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueInventory {
    pub balances: std::collections::HashMap<String, BalanceRow>,
    pub native_balance: Decimal,
    pub chain_usd_total: Decimal,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl VenueInventory {
    pub fn empty(version: u64, now: DateTime<Utc>) -> Self {
        Self {
            balances: std::collections::HashMap::new(),
            native_balance: Decimal::ZERO,
            chain_usd_total: Decimal::ZERO,
            version,
            last_updated: now,
        }
    }

    pub fn total_for(&self, symbol: &str) -> Decimal {
        self.balances
            .get(symbol)
            .map(|b| b.human_balance)
            .unwrap_or(Decimal::ZERO)
    }
}

/// A full two-venue InventorySnapshot, as handed to the RiskGate and
/// DualLegCoordinator for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub venue_a: VenueInventory,
    pub venue_b: VenueInventory,
    /// Tokens for which a shortfall must not pause trading (inventory-low).
    pub inventory_low: std::collections::HashSet<String>,
    /// Tokens paused due to insufficient funds outside the inventory-low carve-out.
    pub paused: std::collections::HashSet<String>,
}

impl InventorySnapshot {
    pub fn total_held(&self, symbol: &str) -> Decimal {
        self.venue_a.total_for(symbol) + self.venue_b.total_for(symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cooldown {
    pub ends_at: DateTime<Utc>,
    pub reason: String,
}

impl Cooldown {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeDirection {
    AToB,
    BToA,
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeDirection::AToB => write!(f, "A->B"),
            BridgeDirection::BToA => write!(f, "B->A"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub id: String,
    pub symbol: String,
    pub amount: Decimal,
    pub direction: BridgeDirection,
    pub tx_hash: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: BridgeStatus,
    pub retry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeMode {
    Live,
    Dry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegState {
    Pending,
    Submitted,
    Retrying,
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegOutcome {
    pub venue: VenueId,
    pub state: LegState,
    pub tx_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub mode: TradeMode,
    pub symbol: String,
    pub direction: ArbDirection,
    pub expected_edge: EdgeResult,
    pub legs: Vec<LegOutcome>,
    pub duration_ms: u64,
}

/// Result of a venue swap call, as exposed across the adapter boundary.
/// `tx_id` is opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub success: bool,
    pub tx_id: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_b_token_id_rejects_bad_length() {
        assert!(VenueBTokenId::parse("short").is_err());
    }

    #[test]
    fn venue_b_token_id_accepts_plausible_mint() {
        let mint = "So11111111111111111111111111111111111111112";
        assert!(VenueBTokenId::parse(mint).is_ok());
    }

    #[test]
    fn arb_direction_sides() {
        assert_eq!(ArbDirection::Forward.sell_side(), VenueId::A);
        assert_eq!(ArbDirection::Forward.buy_side(), VenueId::B);
        assert_eq!(ArbDirection::Reverse.sell_side(), VenueId::B);
        assert_eq!(ArbDirection::Reverse.buy_side(), VenueId::A);
    }
}
