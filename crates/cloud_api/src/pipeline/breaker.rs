//! Per-source circuit breaker: after enough consecutive upstream failures
//! a source is skipped outright for a cooldown period instead of being
//! hammered on every request.

use chrono::{DateTime, Duration, Utc};
use domain::SourceKind;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    /// Consecutive failures before the source is put on cooldown.
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<DateTime<Utc>>,
}

pub struct CircuitBreaker {
    policy: BreakerPolicy,
    states: Mutex<HashMap<SourceKind, BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// When the source is on cooldown at `now`, the instant it reopens.
    /// Past-due cooldowns count as closed: the next attempt goes through,
    /// and a single further failure re-opens immediately.
    pub fn open_until(&self, source: SourceKind, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let states = self.states.lock().expect("breaker lock poisoned");
        states
            .get(&source)
            .and_then(|state| state.open_until)
            .filter(|until| *until > now)
    }

    pub fn record_failure(&self, source: SourceKind, now: DateTime<Utc>) {
        let mut states = self.states.lock().expect("breaker lock poisoned");
        let state = states.entry(source).or_default();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.policy.failure_threshold {
            state.open_until = Some(now + self.policy.cooldown);
            tracing::warn!(
                "{source} source failed {} times in a row, cooling down for {}s",
                state.consecutive_failures,
                self.policy.cooldown.num_seconds()
            );
        }
    }

    pub fn record_success(&self, source: SourceKind) {
        let mut states = self.states.lock().expect("breaker lock poisoned");
        states.remove(&source);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}
