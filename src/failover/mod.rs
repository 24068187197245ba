//! Failover subsystem.
//!
//! Executes caller operations across ordered backend lists, retries and
//! fails over per the configured strategy, and trips per-backend circuit
//! breakers so repeatedly failing backends stop receiving traffic.
//!
//! - [`circuit`]: lazily evaluated per-backend circuit breaker
//! - [`events`]: bounded failover event log and aggregate statistics
//! - [`manager`]: the four dispatch strategies and the public `execute` API

pub mod circuit;
pub mod events;
pub mod manager;

pub use circuit::{CircuitBreaker, CircuitState};
pub use events::{FailoverEvent, FailoverLog, FailoverStats};
pub use manager::{Dispatched, FailoverManager, FailoverStrategy};
