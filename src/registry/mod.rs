//! Backend identity and the static backend registry.
//!
//! # Responsibilities
//! - Strongly-typed backend identity (`BackendId`), the map key everywhere
//! - Static per-backend description (`BackendSpec`): kind, cost, credentials
//! - Immutable registry built once from configuration at startup
//!
//! # Design Decisions
//! - `BackendId` wraps `Arc<str>`: cloned on every dispatch, so cheap clones
//! - Cost is supplied, never estimated here (cost heuristics live upstream)
//! - The registry never changes after construction; dynamic state lives in
//!   the health monitor / load balancer / failover manager record maps

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

/// Opaque identity of one backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for BackendId {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl Serialize for BackendId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BackendId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

/// Kind of compute backend, which determines the probe shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Model runner on this host (capability query probe).
    Local,
    /// Remote API provider (credential-presence probe).
    Hosted,
}

/// Static description of one backend.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub id: BackendId,
    pub kind: BackendKind,
    /// Estimated cost per request in cents, supplied by the cost collaborator.
    pub estimated_cost_cents: f64,
    /// Environment variable holding the provider credential (hosted only).
    pub api_key_env: Option<String>,
}

impl BackendSpec {
    pub fn is_local(&self) -> bool {
        self.kind == BackendKind::Local
    }
}

/// Immutable set of known backends, built from configuration at startup.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: Vec<BackendSpec>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<BackendSpec>) -> Self {
        Self { backends }
    }

    /// Build the registry from validated configuration.
    pub fn from_config(configs: &[BackendConfig]) -> Self {
        let backends = configs
            .iter()
            .map(|c| BackendSpec {
                id: BackendId::from(c.name.as_str()),
                kind: c.kind,
                estimated_cost_cents: c.estimated_cost_cents,
                api_key_env: c.api_key_env.clone(),
            })
            .collect();
        Self { backends }
    }

    pub fn get(&self, id: &BackendId) -> Option<&BackendSpec> {
        self.backends.iter().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_local(&self, id: &BackendId) -> bool {
        self.get(id).map(|b| b.is_local()).unwrap_or(false)
    }

    /// Cost per request in cents, 0.0 for unknown backends.
    pub fn cost_of(&self, id: &BackendId) -> f64 {
        self.get(id).map(|b| b.estimated_cost_cents).unwrap_or(0.0)
    }

    pub fn all(&self) -> &[BackendSpec] {
        &self.backends
    }

    pub fn ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|b| b.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
