//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Caller-supplied candidate list
//!     → balancer.rs (filter by availability, then constraints + soft cap)
//!     → strategy.rs (one of six pure selection algorithms)
//!     → Some(backend) or None (caller handles "no backend available")
//!
//! Dispatch bracket:
//!     start_request → operation runs → end_request
//!     end_request also feeds the health monitor's passive tracking
//! ```
//!
//! # Design Decisions
//! - Strategies are pure over an immutable candidate snapshot; live state
//!   stays in load.rs behind atomics
//! - Unhealthy backends are excluded before constraints are even considered
//! - Empty selection is an explicit None, never an error
//! - The RAII guard makes leaking the active counter impossible

pub mod balancer;
pub mod constraints;
pub mod load;
pub mod strategy;

pub use balancer::{InFlightGuard, LoadBalancer, LoadDistribution};
pub use constraints::SelectionConstraints;
pub use load::{LoadSnapshot, LoadState};
pub use strategy::{CandidateView, Strategy};
