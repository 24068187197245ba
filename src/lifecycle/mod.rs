//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build registry → Spawn health monitor loop
//!
//! Shutdown (shutdown.rs):
//!     Signal triggered → Monitor loop exits on next tick → Tasks drain
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to every background task
//! - Triggering with no subscribers is a no-op, not an error

pub mod shutdown;

pub use shutdown::Shutdown;
