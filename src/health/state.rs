//! Per-backend health record and status state machine.
//!
//! # States
//! - Unknown: no data yet (also the post-reset state)
//! - Healthy / Degraded: backend is routable
//! - Unhealthy: too many consecutive failures, excluded from selection
//! - Offline: the active probe itself could not complete (never reachable,
//!   as opposed to reachable-but-failing)
//!
//! # Design Decisions
//! - Status is recomputed by `evaluate` after every mutation, never assigned
//!   ad hoc; Offline is the one exception and only an active probe error
//!   may set it
//! - Success rate comes from a bounded window of recent outcomes
//! - Response time is an exponentially smoothed average

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::Serialize;

use crate::config::HealthConfig;

/// Bounded window of recent check/usage outcomes.
const OUTCOME_WINDOW: usize = 100;

/// Smoothing factor for the response-time moving average.
const RESPONSE_TIME_ALPHA: f64 = 0.3;

/// Backend health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

/// Thresholds driving the status transition rule.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Consecutive failures before Unhealthy.
    pub failure_threshold: u32,
    /// Success rate below this is Degraded.
    pub degraded_success_rate: f64,
    /// Smoothed response time above this is Degraded, in ms.
    pub degraded_response_time_ms: f64,
}

impl From<&HealthConfig> for HealthThresholds {
    fn from(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            degraded_success_rate: config.degraded_success_rate,
            degraded_response_time_ms: config.degraded_response_time_ms,
        }
    }
}

/// Mutable health state for one backend.
///
/// Externally synchronized: lives inside the monitor's concurrent map and is
/// only mutated under that entry's lock.
#[derive(Debug)]
pub struct HealthRecord {
    status: HealthStatus,
    response_time_ms: f64,
    response_time_seeded: bool,
    consecutive_failures: u32,
    error_count: u64,
    last_check: Option<SystemTime>,
    outcomes: VecDeque<bool>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            response_time_ms: 0.0,
            response_time_seeded: false,
            consecutive_failures: 0,
            error_count: 0,
            last_check: None,
            outcomes: VecDeque::with_capacity(OUTCOME_WINDOW),
        }
    }
}

impl HealthRecord {
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn response_time_ms(&self) -> f64 {
        self.response_time_ms
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn last_check(&self) -> Option<SystemTime> {
        self.last_check
    }

    /// Fraction of recent outcomes that succeeded. A backend with no history
    /// yet is given the benefit of the doubt.
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.outcomes.iter().filter(|s| **s).count();
        successes as f64 / self.outcomes.len() as f64
    }

    /// True iff the backend may be routed to (Healthy or Degraded).
    pub fn is_available(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    /// Record one completed check or usage and re-evaluate status.
    pub fn record_outcome(
        &mut self,
        success: bool,
        response_time_ms: f64,
        thresholds: &HealthThresholds,
    ) {
        self.push_outcome(success);
        self.smooth_response_time(response_time_ms);

        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.error_count += 1;
        }

        self.last_check = Some(SystemTime::now());
        self.status = self.evaluate(thresholds);
    }

    /// Record an active probe that could not complete.
    ///
    /// Counts as a failed outcome and pins the status to Offline, which
    /// distinguishes "never reachable" from "reachable but failing".
    pub fn record_probe_error(&mut self) {
        self.push_outcome(false);
        self.consecutive_failures += 1;
        self.error_count += 1;
        self.last_check = Some(SystemTime::now());
        self.status = HealthStatus::Offline;
    }

    /// Clear all counters and return to Unknown.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The status transition rule, evaluated in precedence order.
    fn evaluate(&self, thresholds: &HealthThresholds) -> HealthStatus {
        if self.consecutive_failures >= thresholds.failure_threshold {
            HealthStatus::Unhealthy
        } else if self.success_rate() < thresholds.degraded_success_rate {
            HealthStatus::Degraded
        } else if self.response_time_ms > thresholds.degraded_response_time_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    fn push_outcome(&mut self, success: bool) {
        if self.outcomes.len() == OUTCOME_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    fn smooth_response_time(&mut self, sample_ms: f64) {
        if !self.response_time_seeded {
            // first sample seeds the average
            self.response_time_ms = sample_ms;
            self.response_time_seeded = true;
        } else {
            self.response_time_ms = (1.0 - RESPONSE_TIME_ALPHA) * self.response_time_ms
                + RESPONSE_TIME_ALPHA * sample_ms;
        }
    }

    /// Copy-out view for observability.
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: self.status,
            response_time_ms: self.response_time_ms,
            success_rate: self.success_rate(),
            consecutive_failures: self.consecutive_failures,
            error_count: self.error_count,
            last_check_unix_ms: self.last_check.and_then(|t| {
                t.duration_since(SystemTime::UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_millis() as u64)
            }),
        }
    }
}

/// Immutable copy of one backend's health state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub response_time_ms: f64,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub error_count: u64,
    pub last_check_unix_ms: Option<u64>,
}
