//! Failure/recovery layer: circuit breakers per external dependency, plus
//! a retry wrapper applied on top of them (§4.10).

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use retry::retry;

use crate::error::AppError;
use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;

/// Keyed breaker registry — one breaker per (component, counterparty), e.g.
/// "venue_a", "venue_b", "bridge_api".
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    failure_threshold: u32,
    failure_window: Duration,
    base_open_duration: Duration,
    success_threshold: u32,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: 5,
            failure_window: Duration::from_secs(120),
            base_open_duration: Duration::from_secs(30),
            success_threshold: 2,
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        let mut entry = self.breakers.entry(key.to_string()).or_insert_with(|| {
            CircuitBreaker::new(
                self.failure_threshold,
                self.failure_window,
                self.base_open_duration,
                self.success_threshold,
            )
        });
        entry.allow(key)
    }

    pub fn record_success(&self, key: &str) {
        if let Some(mut entry) = self.breakers.get_mut(key) {
            entry.record_success(key);
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut entry = self.breakers.entry(key.to_string()).or_insert_with(|| {
            CircuitBreaker::new(
                self.failure_threshold,
                self.failure_window,
                self.base_open_duration,
                self.success_threshold,
            )
        });
        entry.record_failure(key);
    }

    pub fn state_of(&self, key: &str) -> Option<BreakerState> {
        self.breakers.get(key).map(|b| b.state())
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Every adapter call passes through both guards in order (§4.10): the
/// breaker is consulted first and rejects outright while open, then the
/// retry policy absorbs transient failures underneath it. The breaker only
/// observes the final outcome of the (possibly retried) call, not each
/// individual attempt.
pub async fn retry_with_breaker<T, F, Fut>(registry: &BreakerRegistry, key: &str, op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    if !registry.allow(key) {
        return Err(AppError::circuit_open(key));
    }
    let result = retry(key, op).await;
    match &result {
        Ok(_) => registry.record_success(key),
        Err(_) => registry.record_failure(key),
    }
    result
}
