//! Venue adapter trait boundary and the deterministic in-memory simulators
//! shipped with this crate (§4.2). Signing, RPC transport, and program
//! instruction encoding are out of scope; a real deployment supplies its own
//! `VenueAdapter` (GalaChain RPC client, Solana RPC + router client) behind
//! the same trait, the way the teacher's `TradeExecutor<M: Middleware>` is
//! generic over a transport it does not own.

pub mod venue_a;
pub mod venue_b;

pub use venue_a::VenueASimulator;
pub use venue_b::VenueBSimulator;

use crate::error::AppResult;
use crate::types::{Direction, ExecResult, Quote};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[async_trait]
pub trait VenueAdapter: Send + Sync {
    async fn quote(&self, symbol: &str, size: Decimal, direction: Direction) -> AppResult<Quote>;

    async fn swap(
        &self,
        symbol: &str,
        size: Decimal,
        direction: Direction,
        limit: Decimal,
        deadline_secs: u64,
    ) -> AppResult<ExecResult>;

    async fn fetch_balances(&self, owner: &str) -> AppResult<HashMap<String, Decimal>>;
}

/// A deliberately small, constant-product pool fixture: `reserve_token` is
/// the token side, `reserve_u` the U side.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub reserve_token: Decimal,
    pub reserve_u: Decimal,
    pub fee_bps: Decimal,
    pub active_liquidity: Decimal,
}

/// A route fixture for the aggregator side: a fixed effective rate plus a
/// liquidity-scaled impact curve, close enough to drive the pipeline without
/// modeling a real router's multi-hop splitting.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    pub rate_token_per_u: Decimal,
    pub impact_bps_per_unit: Decimal,
}
