//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatch
//! layer. All types derive Serde traits for deserialization from config files,
//! and every field has a default so a minimal config is valid.

use serde::{Deserialize, Serialize};

use crate::failover::FailoverStrategy;
use crate::load_balancer::Strategy;
use crate::registry::BackendKind;

/// Root configuration for the dispatch layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Known backend definitions.
    pub backends: Vec<BackendConfig>,

    /// Health monitoring settings.
    pub health: HealthConfig,

    /// Load balancer settings.
    pub load_balancer: LoadBalancerConfig,

    /// Failover and circuit breaker settings.
    pub failover: FailoverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One backend definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier (e.g. "ollama:llama3", "openrouter:sonnet").
    pub name: String,

    /// Local model runner or hosted API provider.
    pub kind: BackendKind,

    /// Estimated cost per request in cents, supplied by the cost tracker.
    #[serde(default)]
    pub estimated_cost_cents: f64,

    /// Environment variable holding the provider credential (hosted only).
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable the periodic active check loop.
    pub enabled: bool,

    /// Active-probe cadence in seconds.
    pub check_interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failures before a backend is marked Unhealthy.
    pub failure_threshold: u32,

    /// Success rate below which a backend is Degraded.
    pub degraded_success_rate: f64,

    /// Smoothed response time above which a backend is Degraded, in ms.
    pub degraded_response_time_ms: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 30,
            timeout_secs: 5,
            failure_threshold: 3,
            degraded_success_rate: 0.5,
            degraded_response_time_ms: 2000.0,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Soft per-backend concurrency cap used in selection filtering.
    pub max_concurrent_per_backend: usize,

    /// Strategy used when the caller does not name one.
    pub default_strategy: Strategy,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_backend: 10,
            default_strategy: Strategy::FastestResponse,
        }
    }
}

/// Failover configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Strategy used when the caller does not name one.
    pub default_strategy: FailoverStrategy,

    /// Per-backend retry count (Progressive, RetryThenFailover).
    pub max_retries: u32,

    /// Delay between same-backend retries in seconds.
    pub retry_delay_secs: f64,

    /// Failures before a circuit opens.
    pub circuit_breaker_threshold: u32,

    /// Open → HalfOpen window in seconds.
    pub circuit_breaker_timeout_secs: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            default_strategy: FailoverStrategy::Progressive,
            max_retries: 2,
            retry_delay_secs: 1.0,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter when RUST_LOG is not set.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
