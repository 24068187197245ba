//! Backend selection and request accounting.
//!
//! # Responsibilities
//! - Filter candidates through the availability gate and constraints
//! - Apply the chosen strategy to the filtered set
//! - Bracket dispatched requests so load figures stay accurate

use std::collections::BTreeMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::LoadBalancerConfig;
use crate::health::HealthMonitor;
use crate::load_balancer::constraints::SelectionConstraints;
use crate::load_balancer::load::{LoadSnapshot, LoadState};
use crate::load_balancer::strategy::{self, CandidateView, Strategy};
use crate::observability::metrics;
use crate::registry::{BackendId, BackendRegistry};

/// Load-aware backend selector.
///
/// Owns one `LoadState` per backend; selection never blocks on anything but
/// the per-entry map locks.
pub struct LoadBalancer {
    health: Arc<HealthMonitor>,
    registry: Arc<BackendRegistry>,
    loads: DashMap<BackendId, Arc<LoadState>>,
    round_robin_cursor: AtomicUsize,
    config: LoadBalancerConfig,
}

impl LoadBalancer {
    pub fn new(
        health: Arc<HealthMonitor>,
        registry: Arc<BackendRegistry>,
        config: LoadBalancerConfig,
    ) -> Self {
        let loads = DashMap::new();
        for spec in registry.all() {
            loads.insert(
                spec.id.clone(),
                Arc::new(LoadState::new(spec.estimated_cost_cents)),
            );
        }

        Self {
            health,
            registry,
            loads,
            round_robin_cursor: AtomicUsize::new(0),
            config,
        }
    }

    fn load_of(&self, backend: &BackendId) -> Arc<LoadState> {
        self.loads
            .entry(backend.clone())
            .or_insert_with(|| Arc::new(LoadState::new(self.registry.cost_of(backend))))
            .clone()
    }

    /// Select one backend from `candidates`, or `None` when nothing passes
    /// the availability gate and constraints.
    pub fn select_backend(
        &self,
        candidates: &[BackendId],
        strategy: Option<Strategy>,
        constraints: &SelectionConstraints,
    ) -> Option<BackendId> {
        let strategy = strategy.unwrap_or(self.config.default_strategy);

        let available: Vec<CandidateView> = candidates
            .iter()
            .filter(|id| self.health.is_available(id))
            .map(|id| self.view_of(id))
            .collect();

        if available.is_empty() {
            tracing::warn!(strategy = strategy.name(), "no available backends");
            return None;
        }

        let filtered: Vec<CandidateView> = available
            .iter()
            .filter(|c| self.passes_constraints(c, constraints))
            .cloned()
            .collect();

        if filtered.is_empty() {
            tracing::warn!(strategy = strategy.name(), "no backends match constraints");
            return None;
        }

        let selected = strategy::apply(strategy, &filtered, &self.round_robin_cursor)
            // fail open: a degenerate strategy outcome still routes somewhere
            .unwrap_or_else(|| filtered[0].id.clone());

        tracing::debug!(backend = %selected, strategy = strategy.name(), "backend selected");
        Some(selected)
    }

    fn view_of(&self, id: &BackendId) -> CandidateView {
        let load = self.load_of(id);
        CandidateView {
            id: id.clone(),
            active_requests: load.active_requests(),
            avg_response_time_ms: load.avg_response_time_ms(),
            success_rate: self.health.success_rate_of(id),
            estimated_cost_cents: load.estimated_cost_cents(),
            local: self.registry.is_local(id),
        }
    }

    fn passes_constraints(&self, c: &CandidateView, constraints: &SelectionConstraints) -> bool {
        if let Some(max_cost) = constraints.max_cost_cents {
            if c.estimated_cost_cents > max_cost {
                return false;
            }
        }
        if let Some(max_latency) = constraints.max_latency_ms {
            if c.avg_response_time_ms > max_latency {
                return false;
            }
        }
        if let Some(min_rate) = constraints.min_success_rate {
            if c.success_rate < min_rate {
                return false;
            }
        }
        if constraints.require_local && !c.local {
            return false;
        }
        // implicit soft concurrency cap
        c.active_requests < self.config.max_concurrent_per_backend
    }

    /// Record that a request is starting on a backend.
    pub fn start_request(&self, backend: &BackendId) {
        let active = self.load_of(backend).begin();
        metrics::record_active_requests(backend.as_str(), active);
        tracing::debug!(backend = %backend, active, "request started");
    }

    /// Record that a request has completed; forwards the outcome to the
    /// health monitor's passive tracking.
    pub fn end_request(&self, backend: &BackendId, success: bool, response_time_ms: f64) {
        let active = self.load_of(backend).finish(response_time_ms);
        metrics::record_active_requests(backend.as_str(), active);
        metrics::record_request_outcome(backend.as_str(), success);

        self.health.record_usage(backend, success, response_time_ms);
        tracing::debug!(
            backend = %backend,
            success,
            response_time_ms,
            "request completed"
        );
    }

    /// Bracket a dispatched call with a guard that cannot leak the active
    /// counter: dropping it without an explicit completion records a failure.
    pub fn begin(self: &Arc<Self>, backend: &BackendId) -> InFlightGuard {
        self.start_request(backend);
        InFlightGuard {
            balancer: Arc::clone(self),
            backend: backend.clone(),
            started: Instant::now(),
            done: false,
        }
    }

    /// Read-only snapshot of the current load distribution.
    pub fn load_distribution(&self) -> LoadDistribution {
        let mut backends = BTreeMap::new();
        let mut total_active = 0usize;
        let mut total_requests = 0u64;

        for entry in self.loads.iter() {
            let snapshot = entry.value().snapshot();
            total_active += snapshot.active_requests;
            total_requests += snapshot.total_requests;
            backends.insert(
                entry.key().to_string(),
                BackendLoadView {
                    capacity: snapshot.active_requests as f64
                        / self.config.max_concurrent_per_backend as f64,
                    load: snapshot,
                },
            );
        }

        LoadDistribution {
            backends,
            total_active,
            total_requests,
        }
    }
}

/// RAII bracket around one dispatched request.
///
/// Mirrors the usual connection-guard pattern: if the future holding this
/// guard panics or is cancelled, `Drop` completes the accounting as a
/// failure so `active_requests` can never leak.
pub struct InFlightGuard {
    balancer: Arc<LoadBalancer>,
    backend: BackendId,
    started: Instant,
    done: bool,
}

impl InFlightGuard {
    /// Time since the request started, in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Complete the bracket with the request's outcome.
    pub fn complete(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        if self.done {
            return;
        }
        self.done = true;
        self.balancer
            .end_request(&self.backend, success, self.elapsed_ms());
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.finish(false);
    }
}

/// One backend's load plus derived capacity fraction.
#[derive(Debug, Clone, Serialize)]
pub struct BackendLoadView {
    #[serde(flatten)]
    pub load: LoadSnapshot,
    pub capacity: f64,
}

/// Copy-out snapshot of all backends' load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadDistribution {
    pub backends: BTreeMap<String, BackendLoadView>,
    pub total_active: usize,
    pub total_requests: u64,
}
