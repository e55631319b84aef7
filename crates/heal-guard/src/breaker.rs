//! Circuit breaker state machine
//!
//! CLOSED -> OPEN after `failure_threshold` consecutive failures;
//! OPEN -> HALF_OPEN once `open_duration` elapses (checked lazily on
//! the next permission query); HALF_OPEN grants up to
//! `half_open_max_attempts` probes, any failure reopens immediately,
//! `success_threshold_to_close` consecutive successes close and reset
//! all counters. Refusals move no counter: they are domain outcomes,
//! not provider failures.

use crate::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker thresholds; all configurable from the run config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip CLOSED -> OPEN.
    pub failure_threshold: u32,

    /// How long the breaker stays OPEN before probing.
    pub open_duration: Duration,

    /// Probe budget while HALF_OPEN.
    pub half_open_max_attempts: u32,

    /// Consecutive successes that close the breaker again.
    pub success_threshold_to_close: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
            half_open_max_attempts: 3,
            success_threshold_to_close: 2,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_probes: u32,
}

/// Resilience gate in front of the external arbitrator.
///
/// All transitions happen under one short mutex so concurrent callers
/// observe a consistent state; the lock is never held across a call.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                half_open_probes: 0,
            }),
            clock,
        }
    }

    /// Whether arbitration may be attempted right now.
    ///
    /// Performs the lazy OPEN -> HALF_OPEN transition when the open
    /// window has elapsed, and consumes a probe slot while HALF_OPEN.
    pub fn is_healing_allowed(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| self.clock.now().duration_since(at))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.open_duration {
                    info!("circuit breaker half-open, probing arbitration");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probes = 1;
                    inner.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_attempts {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        inner.consecutive_successes += 1;
        match inner.state {
            CircuitState::HalfOpen => {
                if inner.consecutive_successes >= self.config.success_threshold_to_close {
                    info!("circuit breaker closed after successful probes");
                    Self::reset(&mut inner);
                }
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;
        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened, arbitration disabled"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(self.clock.now());
                }
            }
            CircuitState::HalfOpen => {
                // One failed probe reopens immediately.
                warn!("half-open probe failed, circuit breaker reopened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(self.clock.now());
                inner.half_open_probes = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    fn reset(inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
        inner.half_open_probes = 0;
    }
}
