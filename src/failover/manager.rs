//! Failover orchestration.
//!
//! # Responsibilities
//! - Execute a caller-supplied operation across an ordered backend list
//! - Apply one of four failover strategies
//! - Maintain the per-backend circuit breakers and the failover event log
//!
//! # Design Decisions
//! - The operation's error payload is opaque: any `Err` is a failure, and
//!   the last one is returned to the caller untouched
//! - Every attempt is bracketed by the load balancer's guard, so accounting
//!   and passive health tracking stay accurate across failover hops
//! - Terminal outcomes are values (`Dispatched` / `DispatchError`), never
//!   panics or escaping backend errors

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::FailoverConfig;
use crate::error::DispatchError;
use crate::failover::circuit::{CircuitBreaker, CircuitState};
use crate::failover::events::{FailoverEvent, FailoverLog, FailoverStats};
use crate::health::HealthMonitor;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::registry::BackendId;

/// Named failover strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategy {
    /// One attempt per backend, in order, stop at first success.
    Immediate,
    /// Retry each backend up to `max_retries` before moving on.
    Progressive,
    /// Like Immediate, but drives the per-backend circuit breakers.
    CircuitBreaker,
    /// Retry only the primary, then each fallback once.
    RetryThenFailover,
}

impl FailoverStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FailoverStrategy::Immediate => "immediate",
            FailoverStrategy::Progressive => "progressive",
            FailoverStrategy::CircuitBreaker => "circuit_breaker",
            FailoverStrategy::RetryThenFailover => "retry_then_failover",
        }
    }
}

/// Successful dispatch with provenance.
#[derive(Debug)]
pub struct Dispatched<T> {
    pub value: T,
    /// Backend that served the request.
    pub backend: BackendId,
    /// True iff the serving backend differs from the first preference.
    pub failover_occurred: bool,
    /// Operation invocations actually made.
    pub attempts: u32,
}

/// Executes operations with automatic failover between backends.
pub struct FailoverManager {
    health: Arc<HealthMonitor>,
    load_balancer: Arc<LoadBalancer>,
    breakers: DashMap<BackendId, CircuitBreaker>,
    chains: DashMap<BackendId, Vec<BackendId>>,
    log: FailoverLog,
    config: FailoverConfig,
}

impl FailoverManager {
    pub fn new(
        health: Arc<HealthMonitor>,
        load_balancer: Arc<LoadBalancer>,
        config: FailoverConfig,
    ) -> Self {
        Self {
            health,
            load_balancer,
            breakers: DashMap::new(),
            chains: DashMap::new(),
            log: FailoverLog::default(),
            config,
        }
    }

    /// Execute `operation` against `backends` in order, per `strategy`
    /// (config default when `None`).
    pub async fn execute<T, E, F, Fut>(
        &self,
        backends: &[BackendId],
        operation: F,
        strategy: Option<FailoverStrategy>,
    ) -> Result<Dispatched<T>, DispatchError<E>>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        tracing::debug!(
            strategy = strategy.name(),
            backends = backends.len(),
            "dispatching with failover"
        );

        match strategy {
            FailoverStrategy::Immediate => self.immediate(backends, &operation).await,
            FailoverStrategy::Progressive => self.progressive(backends, &operation).await,
            FailoverStrategy::CircuitBreaker => self.circuit_breaker(backends, &operation).await,
            FailoverStrategy::RetryThenFailover => {
                self.retry_then_failover(backends, &operation).await
            }
        }
    }

    async fn immediate<T, E, F, Fut>(
        &self,
        backends: &[BackendId],
        operation: &F,
    ) -> Result<Dispatched<T>, DispatchError<E>>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        let mut last: Option<(BackendId, E)> = None;

        for backend in backends {
            if !self.is_admissible(backend) {
                continue;
            }
            attempts += 1;
            match self.attempt(backend, operation).await {
                Ok(value) => {
                    return Ok(self.succeed(backends, backend, value, attempts, "immediate_failover"))
                }
                Err(e) => last = Some((backend.clone(), e)),
            }
        }

        Err(self.exhaust(backends, last, attempts))
    }

    async fn progressive<T, E, F, Fut>(
        &self,
        backends: &[BackendId],
        operation: &F,
    ) -> Result<Dispatched<T>, DispatchError<E>>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        let mut last: Option<(BackendId, E)> = None;

        for backend in backends {
            if !self.is_admissible(backend) {
                continue;
            }
            for retry in 0..self.config.max_retries {
                attempts += 1;
                match self.attempt(backend, operation).await {
                    Ok(value) => {
                        return Ok(self.succeed(
                            backends,
                            backend,
                            value,
                            attempts,
                            "progressive_failover",
                        ))
                    }
                    Err(e) => {
                        last = Some((backend.clone(), e));
                        if retry + 1 < self.config.max_retries {
                            self.delay().await;
                        }
                    }
                }
            }
        }

        Err(self.exhaust(backends, last, attempts))
    }

    async fn circuit_breaker<T, E, F, Fut>(
        &self,
        backends: &[BackendId],
        operation: &F,
    ) -> Result<Dispatched<T>, DispatchError<E>>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        let mut last: Option<(BackendId, E)> = None;

        for backend in backends {
            if !self.health.is_available(backend) {
                continue;
            }
            if !self.breaker_admits(backend) {
                tracing::info!(backend = %backend, "circuit open, skipping");
                continue;
            }
            attempts += 1;
            match self.attempt(backend, operation).await {
                Ok(value) => {
                    self.record_breaker_success(backend);
                    return Ok(self.succeed(
                        backends,
                        backend,
                        value,
                        attempts,
                        "circuit_breaker_failover",
                    ));
                }
                Err(e) => {
                    self.record_breaker_failure(backend);
                    last = Some((backend.clone(), e));
                }
            }
        }

        Err(self.exhaust(backends, last, attempts))
    }

    async fn retry_then_failover<T, E, F, Fut>(
        &self,
        backends: &[BackendId],
        operation: &F,
    ) -> Result<Dispatched<T>, DispatchError<E>>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some((primary, fallbacks)) = backends.split_first() else {
            return Err(DispatchError::NoBackendAvailable);
        };

        let mut attempts = 0u32;
        let mut last: Option<(BackendId, E)> = None;

        if self.is_admissible(primary) {
            for retry in 0..self.config.max_retries {
                attempts += 1;
                match self.attempt(primary, operation).await {
                    Ok(value) => {
                        return Ok(Dispatched {
                            value,
                            backend: primary.clone(),
                            failover_occurred: false,
                            attempts,
                        })
                    }
                    Err(e) => {
                        last = Some((primary.clone(), e));
                        if retry + 1 < self.config.max_retries {
                            self.delay().await;
                        }
                    }
                }
            }
        }

        // primary exhausted: one shot per fallback, no retries
        for backend in fallbacks {
            if !self.is_admissible(backend) {
                continue;
            }
            attempts += 1;
            match self.attempt(backend, operation).await {
                Ok(value) => {
                    return Ok(self.succeed(
                        backends,
                        backend,
                        value,
                        attempts,
                        "retry_exhausted_failover",
                    ))
                }
                Err(e) => last = Some((backend.clone(), e)),
            }
        }

        Err(self.exhaust(backends, last, attempts))
    }

    /// One bracketed attempt against one backend.
    async fn attempt<T, E, F, Fut>(&self, backend: &BackendId, operation: &F) -> Result<T, E>
    where
        F: Fn(BackendId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.load_balancer.begin(backend);
        match operation(backend.clone()).await {
            Ok(value) => {
                guard.complete(true);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(backend = %backend, "backend attempt failed");
                guard.complete(false);
                Err(e)
            }
        }
    }

    fn succeed<T>(
        &self,
        backends: &[BackendId],
        backend: &BackendId,
        value: T,
        attempts: u32,
        reason: &str,
    ) -> Dispatched<T> {
        let failover_occurred = backend != &backends[0];
        if failover_occurred {
            self.log.record(FailoverEvent::new(
                backends[0].clone(),
                backend.clone(),
                reason,
                true,
            ));
            metrics::record_failover(backends[0].as_str(), backend.as_str());
        }
        Dispatched {
            value,
            backend: backend.clone(),
            failover_occurred,
            attempts,
        }
    }

    fn exhaust<E>(
        &self,
        backends: &[BackendId],
        last: Option<(BackendId, E)>,
        attempts: u32,
    ) -> DispatchError<E> {
        match last {
            None => {
                tracing::warn!("no available backend to dispatch to");
                DispatchError::NoBackendAvailable
            }
            Some((last_backend, last_error)) => {
                tracing::warn!(attempts, last_backend = %last_backend, "all backends exhausted");
                if last_backend != backends[0] {
                    // a hop happened and still failed; keep the stats honest
                    self.log.record(FailoverEvent::new(
                        backends[0].clone(),
                        last_backend.clone(),
                        "all_backends_exhausted",
                        false,
                    ));
                }
                DispatchError::AllBackendsExhausted {
                    last_error,
                    last_backend,
                    attempts,
                }
            }
        }
    }

    /// Health gate plus breaker cooldown, the availability check shared by
    /// every strategy.
    fn is_admissible(&self, backend: &BackendId) -> bool {
        if !self.health.is_available(backend) {
            return false;
        }
        let blocked = self
            .breakers
            .get(backend)
            .map(|b| b.blocks(self.breaker_timeout()))
            .unwrap_or(false);
        !blocked
    }

    /// Breaker admission for the CircuitBreaker strategy; may consume the
    /// single HalfOpen trial.
    fn breaker_admits(&self, backend: &BackendId) -> bool {
        match self.breakers.get_mut(backend) {
            Some(mut breaker) => breaker.try_acquire(self.breaker_timeout()),
            // breakers are created lazily on first failure
            None => true,
        }
    }

    fn record_breaker_failure(&self, backend: &BackendId) {
        let mut breaker = self.breakers.entry(backend.clone()).or_default();
        if breaker.record_failure(self.config.circuit_breaker_threshold) {
            tracing::warn!(
                backend = %backend,
                failures = breaker.failure_count(),
                "circuit breaker opened"
            );
            metrics::record_circuit_open(backend.as_str());
        }
    }

    fn record_breaker_success(&self, backend: &BackendId) {
        if self.breakers.remove(backend).is_some() {
            tracing::info!(backend = %backend, "circuit breaker reset");
        }
    }

    async fn delay(&self) {
        if self.config.retry_delay_secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(self.config.retry_delay_secs)).await;
        }
    }

    fn breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.config.circuit_breaker_timeout_secs)
    }

    /// Manual operator reset of one backend's breaker.
    pub fn reset_circuit(&self, backend: &BackendId) {
        self.record_breaker_success(backend);
    }

    /// Current breaker state; absent breakers are Closed.
    pub fn circuit_state(&self, backend: &BackendId) -> CircuitState {
        self.breakers
            .get(backend)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Backends whose breaker is currently Open.
    pub fn open_breakers(&self) -> Vec<BackendId> {
        let mut open: Vec<BackendId> = self
            .breakers
            .iter()
            .filter(|e| e.value().state() == CircuitState::Open)
            .map(|e| e.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Copy-out failover statistics.
    pub fn failover_stats(&self) -> FailoverStats {
        self.log.stats(self.open_breakers())
    }

    /// Pre-register a static fallback ordering for a primary backend.
    ///
    /// Pure bookkeeping: `execute` always takes the ordered list explicitly.
    pub fn configure_failover_chain(&self, primary: BackendId, fallbacks: Vec<BackendId>) {
        tracing::info!(
            primary = %primary,
            fallbacks = fallbacks.len(),
            "failover chain configured"
        );
        self.chains.insert(primary, fallbacks);
    }

    /// The configured fallback ordering, empty when none was registered.
    pub fn failover_chain(&self, primary: &BackendId) -> Vec<BackendId> {
        self.chains
            .get(primary)
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}
