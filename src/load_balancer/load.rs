//! Per-backend live load counters.
//!
//! # Responsibilities
//! - Track active and lifetime request counts
//! - Maintain a smoothed response-time average
//! - Carry the supplied per-request cost estimate
//!
//! # Design Decisions
//! - All counters are lock-free atomics; the smoothed average stores f64
//!   bits in an `AtomicU64` and updates via CAS
//! - The active counter saturates at zero: a stray extra decrement can
//!   never drive it negative

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Smoothing factor for the response-time moving average.
const RESPONSE_TIME_ALPHA: f64 = 0.3;

/// Live load figures for one backend.
#[derive(Debug)]
pub struct LoadState {
    active_requests: AtomicUsize,
    total_requests: AtomicU64,
    /// f64 bits of the smoothed average response time in ms.
    avg_response_time_bits: AtomicU64,
    avg_seeded: AtomicBool,
    estimated_cost_cents: f64,
}

impl LoadState {
    pub fn new(estimated_cost_cents: f64) -> Self {
        Self {
            active_requests: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            avg_response_time_bits: AtomicU64::new(0f64.to_bits()),
            avg_seeded: AtomicBool::new(false),
            estimated_cost_cents,
        }
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        f64::from_bits(self.avg_response_time_bits.load(Ordering::Relaxed))
    }

    pub fn estimated_cost_cents(&self) -> f64 {
        self.estimated_cost_cents
    }

    /// A request has started on this backend.
    pub fn begin(&self) -> usize {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A request has completed; fold its response time into the average.
    pub fn finish(&self, response_time_ms: f64) -> usize {
        let remaining = self
            .active_requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .map(|prev| prev - 1)
            .unwrap_or(0);

        if !self.avg_seeded.swap(true, Ordering::Relaxed) {
            self.avg_response_time_bits
                .store(response_time_ms.to_bits(), Ordering::Relaxed);
        } else {
            let _ = self.avg_response_time_bits.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |bits| {
                    let avg = f64::from_bits(bits);
                    let next =
                        (1.0 - RESPONSE_TIME_ALPHA) * avg + RESPONSE_TIME_ALPHA * response_time_ms;
                    Some(next.to_bits())
                },
            );
        }

        remaining
    }

    /// Copy-out view of the counters.
    pub fn snapshot(&self) -> LoadSnapshot {
        LoadSnapshot {
            active_requests: self.active_requests(),
            total_requests: self.total_requests(),
            avg_response_time_ms: self.avg_response_time_ms(),
            estimated_cost_cents: self.estimated_cost_cents,
        }
    }
}

/// Immutable copy of one backend's load figures.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSnapshot {
    pub active_requests: usize,
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub estimated_cost_cents: f64,
}
