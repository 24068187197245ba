//! Active health probes.
//!
//! # Responsibilities
//! - Define the probe seam the monitor calls on every check cycle
//! - Provide the default probe: a capability query for local runners, a
//!   credential-presence check for hosted providers
//!
//! # Design Decisions
//! - `Ok(false)` means "reachable but reporting unhealthy"; `Err(_)` means
//!   the probe itself could not complete. The monitor treats the two
//!   differently (Unhealthy-path outcome vs. Offline)
//! - The local capability query shells out to the runner's list command
//!   (`ollama list` for an `ollama:*` backend); the monitor enforces the
//!   configured timeout around the whole probe

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProbeError;
use crate::registry::{BackendKind, BackendSpec};

/// Backend-type-specific active health probe.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// Probe one backend. Must be cheap enough to run every check interval
    /// for every backend; the monitor enforces the configured timeout.
    async fn probe(&self, backend: &BackendSpec) -> Result<bool, ProbeError>;
}

/// Default probe shipped with the monitor.
///
/// Local backends get a capability query: the runner binary (the part of
/// the backend name before the `:`) is asked to list its models, and a
/// clean exit means healthy. Hosted backends are considered reachable when
/// their configured credential environment variable is set and non-empty.
/// Embedders with richer checks supply their own [`BackendProbe`].
#[derive(Debug, Default)]
pub struct CapabilityProbe;

impl CapabilityProbe {
    async fn probe_runner(&self, runner: &str) -> Result<bool, ProbeError> {
        let output = Command::new(runner)
            .arg("list")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Unreachable(format!("{runner}: {e}")))?;
        Ok(output.status.success())
    }
}

#[async_trait]
impl BackendProbe for CapabilityProbe {
    async fn probe(&self, backend: &BackendSpec) -> Result<bool, ProbeError> {
        match backend.kind {
            BackendKind::Local => {
                let id = backend.id.as_str();
                let runner = id.split(':').next().unwrap_or(id);
                self.probe_runner(runner).await
            }
            BackendKind::Hosted => {
                let var = backend
                    .api_key_env
                    .as_deref()
                    .ok_or_else(|| ProbeError::MissingCredential("api_key_env".into()))?;
                match std::env::var(var) {
                    Ok(value) if !value.is_empty() => Ok(true),
                    _ => Err(ProbeError::MissingCredential(var.to_string())),
                }
            }
        }
    }
}
