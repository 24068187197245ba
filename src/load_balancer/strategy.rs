//! Load balancing strategies.
//!
//! Each strategy is a pure function over an immutable candidate snapshot:
//! given the same views it picks the same backend (weighted-random aside).
//! Ties always break to the first candidate in iteration order so selection
//! stays deterministic for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::registry::BackendId;

/// Named selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cycle through candidates on a shared rotating cursor.
    RoundRobin,
    /// Fewest active requests wins.
    LeastLoaded,
    /// Lowest smoothed response time wins.
    FastestResponse,
    /// Random draw weighted by success rate, speed, and idleness.
    WeightedRandom,
    /// Free backends first (fastest among them), else cheapest.
    CostOptimized,
    /// Highest blend of success rate and speed wins.
    QualityOptimized,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::LeastLoaded => "least_loaded",
            Strategy::FastestResponse => "fastest_response",
            Strategy::WeightedRandom => "weighted_random",
            Strategy::CostOptimized => "cost_optimized",
            Strategy::QualityOptimized => "quality_optimized",
        }
    }
}

/// Immutable per-candidate view assembled by the balancer at selection time.
#[derive(Debug, Clone)]
pub struct CandidateView {
    pub id: BackendId,
    pub active_requests: usize,
    pub avg_response_time_ms: f64,
    pub success_rate: f64,
    pub estimated_cost_cents: f64,
    pub local: bool,
}

/// Apply a strategy to a non-empty filtered candidate set.
///
/// `round_robin_cursor` is the shared rotating index for [`Strategy::RoundRobin`].
pub fn apply(
    strategy: Strategy,
    candidates: &[CandidateView],
    round_robin_cursor: &AtomicUsize,
) -> Option<BackendId> {
    if candidates.is_empty() {
        return None;
    }

    let selected = match strategy {
        Strategy::RoundRobin => {
            let cursor = round_robin_cursor.fetch_add(1, Ordering::Relaxed);
            &candidates[cursor % candidates.len()]
        }
        Strategy::LeastLoaded => argmin_by(candidates, |c| c.active_requests as f64),
        Strategy::FastestResponse => argmin_by(candidates, |c| c.avg_response_time_ms),
        Strategy::WeightedRandom => weighted_random(candidates),
        Strategy::CostOptimized => cost_optimized(candidates),
        Strategy::QualityOptimized => argmax_by(candidates, quality_score),
    };

    Some(selected.id.clone())
}

/// First candidate with the strictly smallest key.
fn argmin_by(candidates: &[CandidateView], key: impl Fn(&CandidateView) -> f64) -> &CandidateView {
    let mut best = &candidates[0];
    let mut best_key = key(best);
    for c in &candidates[1..] {
        let k = key(c);
        if k < best_key {
            best = c;
            best_key = k;
        }
    }
    best
}

fn argmax_by(candidates: &[CandidateView], key: impl Fn(&CandidateView) -> f64) -> &CandidateView {
    let mut best = &candidates[0];
    let mut best_key = key(best);
    for c in &candidates[1..] {
        let k = key(c);
        if k > best_key {
            best = c;
            best_key = k;
        }
    }
    best
}

/// Blend of success rate, speed, and idleness used for the random draw.
fn selection_weight(c: &CandidateView) -> f64 {
    let success = c.success_rate;
    let speed = 1.0 / (1.0 + c.avg_response_time_ms / 1000.0);
    let idleness = 1.0 / (1.0 + c.active_requests as f64);
    0.4 * success + 0.4 * speed + 0.2 * idleness
}

fn quality_score(c: &CandidateView) -> f64 {
    let speed = 1.0 / (1.0 + c.avg_response_time_ms / 1000.0);
    0.7 * c.success_rate + 0.3 * speed
}

fn weighted_random(candidates: &[CandidateView]) -> &CandidateView {
    let weights: Vec<f64> = candidates.iter().map(selection_weight).collect();
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        // fail open: scoring degenerated, take the first available candidate
        return &candidates[0];
    }

    let mut draw = rand::thread_rng().gen_range(0.0..total);
    for (c, w) in candidates.iter().zip(&weights) {
        if draw < *w {
            return c;
        }
        draw -= w;
    }
    // floating point remainder lands on the last candidate
    candidates.last().unwrap_or(&candidates[0])
}

fn cost_optimized(candidates: &[CandidateView]) -> &CandidateView {
    let free: Vec<&CandidateView> = candidates
        .iter()
        .filter(|c| c.estimated_cost_cents == 0.0)
        .collect();
    if !free.is_empty() {
        // among free backends, fastest response wins
        let mut best = free[0];
        for c in &free[1..] {
            if c.avg_response_time_ms < best.avg_response_time_ms {
                best = c;
            }
        }
        return best;
    }
    argmin_by(candidates, |c| c.estimated_cost_cents)
}
