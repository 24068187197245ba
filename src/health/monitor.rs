//! Health monitor: periodic active checks plus passive usage tracking.
//!
//! # Responsibilities
//! - Run the periodic check loop over every registered backend
//! - Fold caller-reported usage outcomes into the same records
//! - Answer the availability question other components gate on

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthConfig;
use crate::health::probe::BackendProbe;
use crate::health::state::{HealthRecord, HealthSnapshot, HealthStatus, HealthThresholds};
use crate::observability::metrics;
use crate::registry::{BackendId, BackendRegistry};

/// Tracks the best current estimate of every backend's health.
///
/// One record per backend in a concurrent map; unrelated backends never
/// contend. Safe to share behind an `Arc` between the check loop and any
/// number of dispatching tasks.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    probe: Arc<dyn BackendProbe>,
    records: DashMap<BackendId, HealthRecord>,
    thresholds: HealthThresholds,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<BackendRegistry>,
        probe: Arc<dyn BackendProbe>,
        config: HealthConfig,
    ) -> Self {
        let records = DashMap::new();
        for spec in registry.all() {
            records.insert(spec.id.clone(), HealthRecord::default());
        }
        tracing::info!(backends = registry.len(), "health monitor tracking backends");

        Self {
            registry,
            probe,
            records,
            thresholds: HealthThresholds::from(&config),
            config,
        }
    }

    /// Drive the periodic check loop until the shutdown signal fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.check_interval_secs,
            timeout_secs = self.config.timeout_secs,
            "health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.check_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every registered backend once.
    ///
    /// Individual probe failures are recorded and logged, never propagated;
    /// one bad backend cannot take the cycle down.
    pub async fn check_all(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for spec in self.registry.all() {
            let started = Instant::now();
            let outcome = time::timeout(timeout, self.probe.probe(spec)).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(Ok(healthy)) => {
                    if !healthy {
                        tracing::warn!(backend = %spec.id, "health check reported unhealthy");
                    }
                    self.apply_outcome(&spec.id, healthy, elapsed_ms);
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend = %spec.id, error = %e, "health probe failed");
                    self.apply_probe_error(&spec.id);
                }
                Err(_) => {
                    tracing::warn!(backend = %spec.id, "health probe timed out");
                    self.apply_probe_error(&spec.id);
                }
            }

            metrics::record_backend_health(spec.id.as_str(), self.is_available(&spec.id));
        }
    }

    /// Passive update from a caller that just used a backend directly.
    pub fn record_usage(&self, backend: &BackendId, success: bool, response_time_ms: f64) {
        if !self.registry.contains(backend) {
            tracing::debug!(backend = %backend, "usage recorded for unregistered backend, ignoring");
            return;
        }
        self.apply_outcome(backend, success, response_time_ms);
    }

    fn apply_outcome(&self, backend: &BackendId, success: bool, response_time_ms: f64) {
        let mut entry = self
            .records
            .entry(backend.clone())
            .or_default();
        let before = entry.status();
        entry.record_outcome(success, response_time_ms, &self.thresholds);
        let after = entry.status();
        drop(entry);

        if before != after {
            tracing::info!(backend = %backend, from = ?before, to = ?after, "backend health changed");
        }
    }

    fn apply_probe_error(&self, backend: &BackendId) {
        if let Some(mut record) = self.records.get_mut(backend) {
            record.record_probe_error();
        }
    }

    /// The sole routing gate: true iff status is Healthy or Degraded.
    pub fn is_available(&self, backend: &BackendId) -> bool {
        self.records
            .get(backend)
            .map(|r| r.is_available())
            .unwrap_or(false)
    }

    pub fn status_of(&self, backend: &BackendId) -> Option<HealthStatus> {
        self.records.get(backend).map(|r| r.status())
    }

    pub fn snapshot_of(&self, backend: &BackendId) -> Option<HealthSnapshot> {
        self.records.get(backend).map(|r| r.snapshot())
    }

    /// Recent success rate for a backend, 1.0 when untracked.
    pub fn success_rate_of(&self, backend: &BackendId) -> f64 {
        self.records
            .get(backend)
            .map(|r| r.success_rate())
            .unwrap_or(1.0)
    }

    pub fn healthy(&self) -> Vec<BackendId> {
        self.with_status(|s| s == HealthStatus::Healthy)
    }

    pub fn degraded(&self) -> Vec<BackendId> {
        self.with_status(|s| s == HealthStatus::Degraded)
    }

    /// Unhealthy and Offline backends.
    pub fn unhealthy(&self) -> Vec<BackendId> {
        self.with_status(|s| matches!(s, HealthStatus::Unhealthy | HealthStatus::Offline))
    }

    fn with_status(&self, predicate: impl Fn(HealthStatus) -> bool) -> Vec<BackendId> {
        let mut out: Vec<BackendId> = self
            .records
            .iter()
            .filter(|e| predicate(e.value().status()))
            .map(|e| e.key().clone())
            .collect();
        out.sort();
        out
    }

    /// Available candidate with the lowest smoothed response time.
    ///
    /// Ties break to the first candidate in the given order.
    pub fn fastest(&self, candidates: &[BackendId]) -> Option<BackendId> {
        let mut best: Option<(BackendId, f64)> = None;
        for id in candidates {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            if !record.is_available() {
                continue;
            }
            let rt = record.response_time_ms();
            match &best {
                Some((_, best_rt)) if rt >= *best_rt => {}
                _ => best = Some((id.clone(), rt)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Clear a backend's counters and return it to Unknown. Used by external
    /// recovery actions.
    pub fn reset(&self, backend: &BackendId) {
        if let Some(mut record) = self.records.get_mut(backend) {
            record.reset();
            tracing::info!(backend = %backend, "health tracking reset");
        }
    }

    /// Copy-out summary for observability.
    pub fn summary(&self) -> HealthSummary {
        let mut backends = BTreeMap::new();
        let mut healthy = 0usize;
        let mut degraded = 0usize;
        let mut unhealthy = 0usize;

        for entry in self.records.iter() {
            match entry.value().status() {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Degraded => degraded += 1,
                HealthStatus::Unhealthy | HealthStatus::Offline => unhealthy += 1,
                HealthStatus::Unknown => {}
            }
            backends.insert(entry.key().to_string(), entry.value().snapshot());
        }

        let total = self.records.len();
        HealthSummary {
            total_backends: total,
            healthy,
            degraded,
            unhealthy,
            health_percentage: if total > 0 {
                healthy as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            backends,
        }
    }
}

/// Copy-out summary of every backend's health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub total_backends: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub health_percentage: f64,
    pub backends: BTreeMap<String, HealthSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::registry::{BackendKind, BackendSpec};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Probe returning a fixed script per backend.
    struct ScriptedProbe {
        script: Mutex<HashMap<String, Vec<Result<bool, ProbeError>>>>,
    }

    impl ScriptedProbe {
        fn new(script: HashMap<String, Vec<Result<bool, ProbeError>>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl BackendProbe for ScriptedProbe {
        async fn probe(&self, backend: &BackendSpec) -> Result<bool, ProbeError> {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(backend.id.as_str()) {
                Some(steps) if !steps.is_empty() => steps.remove(0),
                _ => Ok(true),
            }
        }
    }

    fn registry(names: &[&str]) -> Arc<BackendRegistry> {
        Arc::new(BackendRegistry::new(
            names
                .iter()
                .map(|n| BackendSpec {
                    id: BackendId::from(*n),
                    kind: BackendKind::Local,
                    estimated_cost_cents: 0.0,
                    api_key_env: None,
                })
                .collect(),
        ))
    }

    fn monitor_with_script(
        names: &[&str],
        script: HashMap<String, Vec<Result<bool, ProbeError>>>,
    ) -> HealthMonitor {
        HealthMonitor::new(
            registry(names),
            Arc::new(ScriptedProbe::new(script)),
            HealthConfig::default(),
        )
    }

    /// Probe that hangs past the check timeout on its first call only.
    struct SlowThenFastProbe {
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl BackendProbe for SlowThenFastProbe {
        async fn probe(&self, _backend: &BackendSpec) -> Result<bool, ProbeError> {
            if self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                == 0
            {
                time::sleep(Duration::from_secs(30)).await;
            }
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_counts_as_failure_for_that_cycle_only() {
        let a = BackendId::from("a");
        let monitor = HealthMonitor::new(
            registry(&["a"]),
            Arc::new(SlowThenFastProbe {
                calls: std::sync::atomic::AtomicU32::new(0),
            }),
            HealthConfig::default(),
        );

        // first cycle: probe overruns timeout_secs and is cut off
        monitor.check_all().await;
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Offline));
        assert!(!monitor.is_available(&a));

        // next cycle completes normally; the timeout was not held against it
        monitor.check_all().await;
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Healthy));
        assert!(monitor.is_available(&a));
    }

    #[tokio::test]
    async fn test_failing_checks_reach_unhealthy() {
        let a = BackendId::from("a");
        let script = HashMap::from([(
            "a".to_string(),
            vec![Ok(false), Ok(false), Ok(false)],
        )]);
        let monitor = monitor_with_script(&["a"], script);

        monitor.check_all().await;
        monitor.check_all().await;
        assert_ne!(monitor.status_of(&a), Some(HealthStatus::Unhealthy));

        monitor.check_all().await;
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Unhealthy));
        assert!(!monitor.is_available(&a));
        assert_eq!(monitor.unhealthy(), vec![a]);
    }

    #[tokio::test]
    async fn test_probe_error_marks_offline() {
        let a = BackendId::from("a");
        let script = HashMap::from([(
            "a".to_string(),
            vec![Err(ProbeError::Unreachable("connection refused".into()))],
        )]);
        let monitor = monitor_with_script(&["a"], script);

        monitor.check_all().await;
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Offline));
        assert!(!monitor.is_available(&a));

        // probe recovers on the next cycle (script exhausted → Ok(true))
        monitor.check_all().await;
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Healthy));
    }

    #[tokio::test]
    async fn test_passive_usage_drives_status() {
        let a = BackendId::from("a");
        let monitor = monitor_with_script(&["a"], HashMap::new());

        monitor.record_usage(&a, true, 120.0);
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Healthy));
        assert!(monitor.is_available(&a));

        for _ in 0..3 {
            monitor.record_usage(&a, false, 120.0);
        }
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Unhealthy));
    }

    #[tokio::test]
    async fn test_unregistered_usage_is_ignored() {
        let monitor = monitor_with_script(&["a"], HashMap::new());
        let ghost = BackendId::from("ghost");
        monitor.record_usage(&ghost, true, 10.0);
        assert_eq!(monitor.status_of(&ghost), None);
        assert!(!monitor.is_available(&ghost));
    }

    #[tokio::test]
    async fn test_fastest_prefers_lowest_response_time() {
        let a = BackendId::from("a");
        let b = BackendId::from("b");
        let c = BackendId::from("c");
        let monitor = monitor_with_script(&["a", "b", "c"], HashMap::new());

        monitor.record_usage(&a, true, 300.0);
        monitor.record_usage(&b, true, 50.0);
        // c stays Unknown → filtered out even though its rt is 0

        let candidates = vec![a.clone(), b.clone(), c.clone()];
        assert_eq!(monitor.fastest(&candidates), Some(b.clone()));

        // unhealthy backends are excluded even when fastest
        for _ in 0..3 {
            monitor.record_usage(&b, false, 50.0);
        }
        assert_eq!(monitor.fastest(&candidates), Some(a));
    }

    #[tokio::test]
    async fn test_reset_clears_counters() {
        let a = BackendId::from("a");
        let monitor = monitor_with_script(&["a"], HashMap::new());
        for _ in 0..4 {
            monitor.record_usage(&a, false, 10.0);
        }
        monitor.reset(&a);
        assert_eq!(monitor.status_of(&a), Some(HealthStatus::Unknown));
        let snap = monitor.snapshot_of(&a).unwrap();
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.error_count, 0);
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let a = BackendId::from("a");
        let b = BackendId::from("b");
        let monitor = monitor_with_script(&["a", "b", "c"], HashMap::new());

        monitor.record_usage(&a, true, 10.0);
        for _ in 0..3 {
            monitor.record_usage(&b, false, 10.0);
        }

        let summary = monitor.summary();
        assert_eq!(summary.total_backends, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.unhealthy, 1);
        assert!(summary.backends.contains_key("c"));
    }
}
