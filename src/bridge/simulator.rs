//! Deterministic in-memory bridge adapter: submissions advance through
//! sub-5 "in-flight" codes on successive polls before landing on a terminal
//! code, the way `VenueASimulator`/`VenueBSimulator` stand in for real wire
//! protocols (§1 scope, §6 bridge-controller interface).

use crate::bridge::{BridgeAdapter, BridgeStatusReport, BridgeSubmission};
use crate::error::AppResult;
use crate::types::BridgeDirection;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Status code `status()` reports for a forced-failure submission; `> 5` is
/// `BridgeController`'s terminal-failure threshold (see `bridge/mod.rs`).
const FORCED_FAILURE_CODE: u32 = 9;

struct Submission {
    polls_seen: AtomicU64,
    succeed_after_polls: u64,
    immediate_failure: bool,
}

pub struct BridgeSimulator {
    submissions: DashMap<String, Submission>,
    next_id: AtomicU64,
    succeed_after_polls: u64,
    force_failure_next: AtomicBool,
}

impl BridgeSimulator {
    pub fn new() -> Self {
        Self {
            submissions: DashMap::new(),
            next_id: AtomicU64::new(1),
            succeed_after_polls: 2,
            force_failure_next: AtomicBool::new(false),
        }
    }

    /// Test/ops hook: force the next submission to report a terminal failure
    /// immediately instead of progressing to success. Consumed on the next
    /// `submit_bridge` call; does not affect submissions already in flight.
    pub fn with_immediate_failure(self) -> Self {
        self.force_failure_next.store(true, Ordering::Relaxed);
        self
    }
}

impl Default for BridgeSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BridgeAdapter for BridgeSimulator {
    async fn submit_bridge(&self, _symbol: &str, _amount: Decimal, _direction: BridgeDirection) -> AppResult<BridgeSubmission> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tx_id = format!("bridge-sim-{id}");
        let immediate_failure = self.force_failure_next.swap(false, Ordering::Relaxed);
        self.submissions.insert(
            tx_id.clone(),
            Submission {
                polls_seen: AtomicU64::new(0),
                succeed_after_polls: self.succeed_after_polls,
                immediate_failure,
            },
        );
        Ok(BridgeSubmission { tx_id })
    }

    async fn status(&self, tx_id: &str) -> AppResult<BridgeStatusReport> {
        let Some(entry) = self.submissions.get(tx_id) else {
            return Ok(BridgeStatusReport {
                code: 404,
                description: "not yet observable".to_string(),
            });
        };
        if entry.immediate_failure {
            return Ok(BridgeStatusReport {
                code: FORCED_FAILURE_CODE,
                description: "terminal failure (forced)".to_string(),
            });
        }
        let seen = entry.polls_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen < entry.succeed_after_polls {
            return Ok(BridgeStatusReport {
                code: 2,
                description: "relaying".to_string(),
            });
        }
        Ok(BridgeStatusReport {
            code: 5,
            description: "confirmed on destination chain".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tx_id_is_not_yet_observable() {
        let sim = BridgeSimulator::new();
        let status = sim.status("nonexistent").await.unwrap();
        assert_eq!(status.code, 404);
    }

    #[tokio::test]
    async fn immediate_failure_reports_terminal_on_first_poll() {
        let sim = BridgeSimulator::new().with_immediate_failure();
        let sub = sim.submit_bridge("GALA", Decimal::ONE, BridgeDirection::AToB).await.unwrap();
        let status = sim.status(&sub.tx_id).await.unwrap();
        assert!(status.code > 5);
    }

    #[tokio::test]
    async fn immediate_failure_does_not_affect_later_submissions() {
        let sim = BridgeSimulator::new().with_immediate_failure();
        let failing = sim.submit_bridge("GALA", Decimal::ONE, BridgeDirection::AToB).await.unwrap();
        assert!(sim.status(&failing.tx_id).await.unwrap().code > 5);

        let normal = sim.submit_bridge("GALA", Decimal::ONE, BridgeDirection::AToB).await.unwrap();
        let first = sim.status(&normal.tx_id).await.unwrap();
        assert!(first.code < 5);
    }

    #[tokio::test]
    async fn submission_becomes_terminal_after_enough_polls() {
        let sim = BridgeSimulator::new();
        let sub = sim.submit_bridge("GALA", Decimal::ONE, BridgeDirection::AToB).await.unwrap();
        let first = sim.status(&sub.tx_id).await.unwrap();
        assert!(first.code < 5);
        let second = sim.status(&sub.tx_id).await.unwrap();
        assert!(second.code >= 5);
    }
}
