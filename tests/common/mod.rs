//! Shared fixtures for integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backend_dispatch::config::{FailoverConfig, HealthConfig, LoadBalancerConfig};
use backend_dispatch::error::ProbeError;
use backend_dispatch::health::{BackendProbe, HealthMonitor};
use backend_dispatch::load_balancer::LoadBalancer;
use backend_dispatch::registry::{BackendId, BackendKind, BackendRegistry, BackendSpec};
use backend_dispatch::FailoverManager;

/// What the scripted probe reports for one backend.
#[derive(Clone, Copy)]
pub enum ProbeMode {
    Up,
    Down,
    Broken,
}

/// Probe whose verdict per backend can be flipped mid-test.
///
/// Unlisted backends report Up.
pub struct ScriptedProbe {
    modes: Mutex<HashMap<String, ProbeMode>>,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            modes: Mutex::new(HashMap::new()),
        })
    }

    pub fn set(&self, backend: &str, mode: ProbeMode) {
        self.modes
            .lock()
            .unwrap()
            .insert(backend.to_string(), mode);
    }
}

#[async_trait]
impl BackendProbe for ScriptedProbe {
    async fn probe(&self, backend: &BackendSpec) -> Result<bool, ProbeError> {
        let mode = self
            .modes
            .lock()
            .unwrap()
            .get(backend.id.as_str())
            .copied()
            .unwrap_or(ProbeMode::Up);
        match mode {
            ProbeMode::Up => Ok(true),
            ProbeMode::Down => Ok(false),
            ProbeMode::Broken => Err(ProbeError::Unreachable("scripted outage".to_string())),
        }
    }
}

/// Fully wired dispatch stack over local backends with scripted probes.
pub struct Fixture {
    pub probe: Arc<ScriptedProbe>,
    pub health: Arc<HealthMonitor>,
    pub balancer: Arc<LoadBalancer>,
    pub manager: FailoverManager,
}

/// Build the stack for `backends` (name, estimated cost in cents).
///
/// Retry delay is zeroed so failover tests run instantly; everything else
/// keeps its config default unless the test overrides it.
pub fn fixture_with(backends: &[(&str, f64)], failover: FailoverConfig) -> Fixture {
    let registry = Arc::new(BackendRegistry::new(
        backends
            .iter()
            .map(|(name, cost)| BackendSpec {
                id: BackendId::from(*name),
                kind: BackendKind::Local,
                estimated_cost_cents: *cost,
                api_key_env: None,
            })
            .collect(),
    ));
    let probe = ScriptedProbe::new();
    let health = Arc::new(HealthMonitor::new(
        Arc::clone(&registry),
        Arc::clone(&probe) as Arc<dyn BackendProbe>,
        HealthConfig {
            check_interval_secs: 1,
            ..HealthConfig::default()
        },
    ));
    let balancer = Arc::new(LoadBalancer::new(
        Arc::clone(&health),
        registry,
        LoadBalancerConfig::default(),
    ));
    let manager = FailoverManager::new(Arc::clone(&health), Arc::clone(&balancer), failover);

    Fixture {
        probe,
        health,
        balancer,
        manager,
    }
}

pub fn fixture(names: &[&str]) -> Fixture {
    let backends: Vec<(&str, f64)> = names.iter().map(|n| (*n, 0.0)).collect();
    fixture_with(
        &backends,
        FailoverConfig {
            retry_delay_secs: 0.0,
            ..FailoverConfig::default()
        },
    )
}

pub fn id(name: &str) -> BackendId {
    BackendId::from(name)
}

pub fn ids(names: &[&str]) -> Vec<BackendId> {
    names.iter().map(|n| BackendId::from(*n)).collect()
}
