//! Three-state circuit breaker guarding per-component failure storms.
//!
//! Escalation is wall-clock based (seconds), generalized from
//! `arbitrage::cooldown::RouteCooldown`'s block-counted 5x backoff: the open
//! duration doubles on each trip within the failure window, capped at 4x the
//! base duration, rather than resetting to the base on every half-open probe
//! failure.

use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// One breaker instance, keyed externally (see `Registry`).
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    trip_count: u32,

    failure_threshold: u32,
    failure_window: Duration,
    base_open_duration: Duration,
    success_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, failure_window: Duration, base_open_duration: Duration, success_threshold: u32) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            last_failure_at: None,
            trip_count: 0,
            failure_threshold,
            failure_window,
            base_open_duration,
            success_threshold,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a call should be attempted right now. Transitions
    /// Open -> HalfOpen once the (escalated) open duration elapses.
    pub fn allow(&mut self, label: &str) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let open_duration = self.current_open_duration();
                if self.opened_at.map(|t| t.elapsed() >= open_duration).unwrap_or(true) {
                    info!(breaker = label, "circuit half-open, probing");
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self, label: &str) {
        match self.state {
            BreakerState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    info!(breaker = label, "circuit closed after recovery");
                    self.reset_to_closed();
                }
            }
            BreakerState::Closed => {
                self.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self, label: &str) {
        let now = Instant::now();
        match self.state {
            BreakerState::HalfOpen => {
                warn!(breaker = label, "probe failed, reopening circuit");
                self.trip();
            }
            BreakerState::Closed => {
                let within_window = self
                    .last_failure_at
                    .map(|t| now.duration_since(t) <= self.failure_window)
                    .unwrap_or(true);
                self.failure_count = if within_window { self.failure_count + 1 } else { 1 };
                self.last_failure_at = Some(now);
                if self.failure_count >= self.failure_threshold {
                    warn!(breaker = label, failures = self.failure_count, "circuit opening");
                    self.trip();
                }
            }
            BreakerState::Open => {
                self.last_failure_at = Some(now);
            }
        }
    }

    fn trip(&mut self) {
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
        self.success_count = 0;
        self.trip_count = self.trip_count.saturating_add(1);
    }

    fn reset_to_closed(&mut self) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
        self.trip_count = 0;
    }

    /// base x 2^(trips-1), capped at 4x base.
    fn current_open_duration(&self) -> Duration {
        let multiplier = 1u32 << self.trip_count.saturating_sub(1).min(2);
        self.base_open_duration * multiplier.min(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(60), Duration::from_secs(10), 2)
    }

    #[test]
    fn closed_after_fewer_than_threshold_failures() {
        let mut cb = breaker();
        for _ in 0..4 {
            cb.record_failure("t");
        }
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.allow("t"));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let mut cb = breaker();
        for _ in 0..5 {
            cb.record_failure("t");
        }
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow("t"));
    }

    #[test]
    fn reopen_escalates_duration() {
        let mut cb = breaker();
        for _ in 0..5 {
            cb.record_failure("t");
        }
        assert_eq!(cb.trip_count, 1);
        cb.opened_at = Some(Instant::now() - Duration::from_secs(11));
        assert!(cb.allow("t"));
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.record_failure("t");
        assert_eq!(cb.state(), BreakerState::Open);
        assert_eq!(cb.trip_count, 2);
        assert_eq!(cb.current_open_duration(), Duration::from_secs(20));
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let mut cb = breaker();
        for _ in 0..5 {
            cb.record_failure("t");
        }
        cb.opened_at = Some(Instant::now() - Duration::from_secs(11));
        assert!(cb.allow("t"));
        cb.record_success("t");
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.record_success("t");
        assert_eq!(cb.state(), BreakerState::Closed);
    }
}
