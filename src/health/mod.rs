//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Active checks (monitor.rs):
//!     Periodic timer
//!     → probe.rs (type-specific probe, under timeout)
//!     → state.rs (record outcome, re-evaluate status)
//!
//! Passive updates (monitor.rs):
//!     Caller used a backend directly
//!     → record_usage(success, response_time)
//!     → state.rs (same records, same rule)
//!
//! State machine (state.rs):
//!     Unknown / Healthy / Degraded / Unhealthy / Offline
//!     status = f(consecutive_failures, success_rate, response_time)
//! ```
//!
//! # Design Decisions
//! - Active and passive updates are complementary and feed the same records
//! - Only Healthy and Degraded backends are routable
//! - A probe that cannot complete is Offline, not merely Unhealthy
//! - One independently locked record per backend, never a global lock

pub mod monitor;
pub mod probe;
pub mod state;

pub use monitor::{HealthMonitor, HealthSummary};
pub use probe::{BackendProbe, CapabilityProbe};
pub use state::{HealthRecord, HealthSnapshot, HealthStatus, HealthThresholds};
