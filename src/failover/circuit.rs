//! Per-backend circuit breaker.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: backend assumed down, attempts refused until the cooldown lapses
//! - HalfOpen: one probe attempt in flight to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → HalfOpen: acquire after the cooldown window (lazy, no timer)
//! HalfOpen → Closed: trial succeeds (count reset)
//! HalfOpen → Open: trial fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - Transitions are evaluated at acquire time, never by a background timer
//! - HalfOpen admits exactly one trial; concurrent acquirers are refused.
//!   A trial whose caller vanished (the future was cancelled before the
//!   outcome was recorded) goes stale after the cooldown window and the
//!   next acquirer gets a fresh trial, so a dropped trial cannot wedge the
//!   breaker in HalfOpen forever
//! - Independent of the health monitor's failure counter: health decides
//!   whether to route at all, the breaker decides whether a failover chain
//!   is in cooldown

use std::time::{Duration, Instant};

use serde::Serialize;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Failure-cooldown state machine for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            trial_started: None,
        }
    }
}

impl CircuitBreaker {
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Ask to send an attempt through the breaker.
    ///
    /// Lazily moves Open → HalfOpen once the cooldown has elapsed; the
    /// HalfOpen trial is granted to exactly one caller. A trial whose
    /// outcome was never recorded expires after `timeout` and the breaker
    /// grants a fresh one.
    pub fn try_acquire(&mut self, timeout: Duration) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = self
                    .opened_at
                    .map(|t| t.elapsed() > timeout)
                    .unwrap_or(true);
                if expired {
                    self.state = CircuitState::HalfOpen;
                    self.trial_started = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                // a trial is in flight; take over only once it has gone stale
                let stale = self
                    .trial_started
                    .map(|t| t.elapsed() > timeout)
                    .unwrap_or(true);
                if stale {
                    self.trial_started = Some(Instant::now());
                }
                stale
            }
        }
    }

    /// Whether the breaker currently refuses traffic, without consuming the
    /// HalfOpen trial. Used by strategies that respect but do not drive the
    /// breaker.
    pub fn blocks(&self, timeout: Duration) -> bool {
        self.state == CircuitState::Open
            && self
                .opened_at
                .map(|t| t.elapsed() <= timeout)
                .unwrap_or(false)
    }

    /// Record a successful attempt: back to Closed, counters cleared.
    pub fn record_success(&mut self) {
        *self = Self::default();
    }

    /// Record a failed attempt. Returns true when this failure opened the
    /// circuit (for logging at the transition, not on every failure).
    pub fn record_failure(&mut self, threshold: u32) -> bool {
        self.failure_count += 1;
        match self.state {
            CircuitState::HalfOpen => {
                // failed trial: cooldown restarts
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
                self.trial_started = None;
                true
            }
            CircuitState::Closed if self.failure_count >= threshold => {
                self.state = CircuitState::Open;
                self.opened_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_opens_at_threshold() {
        let mut breaker = CircuitBreaker::default();
        assert!(!breaker.record_failure(3));
        assert!(!breaker.record_failure(3));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire(TIMEOUT));

        assert!(breaker.record_failure(3));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire(TIMEOUT));
        assert!(breaker.blocks(TIMEOUT));
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1);
        assert!(!breaker.try_acquire(TIMEOUT));

        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire(TIMEOUT));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // second acquirer while the trial is pending is refused
        assert!(!breaker.try_acquire(TIMEOUT));
    }

    #[test]
    fn test_successful_trial_closes() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1);
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire(TIMEOUT));

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.try_acquire(TIMEOUT));
    }

    #[test]
    fn test_failed_trial_reopens_with_fresh_cooldown() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1);
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire(TIMEOUT));

        assert!(breaker.record_failure(1));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire(TIMEOUT));
    }

    #[test]
    fn test_stale_trial_expires_and_readmits() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1);
        std::thread::sleep(Duration::from_millis(25));

        // trial granted but its outcome is never recorded (caller cancelled)
        assert!(breaker.try_acquire(TIMEOUT));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(!breaker.try_acquire(TIMEOUT));

        // after another cooldown the abandoned trial expires
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.try_acquire(TIMEOUT));
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_blocks_does_not_consume_the_trial() {
        let mut breaker = CircuitBreaker::default();
        breaker.record_failure(1);
        std::thread::sleep(Duration::from_millis(25));

        // cooldown over: no longer blocking, but still Open until acquired
        assert!(!breaker.blocks(TIMEOUT));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire(TIMEOUT));
    }
}
