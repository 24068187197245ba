//! Backend dispatch and resilience layer.
//!
//! Routes requests across a fleet of inference backends: continuous health
//! monitoring, strategy-driven load balancing, and automatic failover with
//! per-backend circuit breakers.

pub mod config;
pub mod error;
pub mod failover;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod registry;

pub use config::DispatchConfig;
pub use error::{DispatchError, ProbeError};
pub use failover::{Dispatched, FailoverManager, FailoverStrategy};
pub use health::{HealthMonitor, HealthStatus};
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancer, SelectionConstraints, Strategy};
pub use registry::{BackendId, BackendKind, BackendRegistry, BackendSpec};
