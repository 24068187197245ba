//! Error taxonomy for the dispatch layer.
//!
//! Probe failures are recorded by the health monitor and never escape it.
//! Selection exhaustion surfaces as `None` from `select_backend`. Only the
//! two terminal dispatch failures reach callers, as values, never panics.

use thiserror::Error;

use crate::registry::BackendId;

/// A health probe that could not complete.
///
/// Distinct from a probe that completed and reported unhealthy data.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("missing credential: {0} is not set")]
    MissingCredential(String),
}

/// Terminal failure from `FailoverManager::execute`.
///
/// `E` is the opaque error type of the caller-supplied operation; this layer
/// never inspects it, only carries the last one observed.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// No backend in the list was admissible (health gate or open breaker),
    /// so no attempt was ever made.
    #[error("no available backend")]
    NoBackendAvailable,

    /// Every admissible backend was tried per the strategy and all failed.
    #[error("all backends exhausted after {attempts} attempts")]
    AllBackendsExhausted {
        /// Error from the final attempt. Opaque: not required to implement
        /// `std::error::Error`, so it is carried as a plain field.
        last_error: E,
        /// Backend that served the final attempt.
        last_backend: BackendId,
        /// Total operation invocations made.
        attempts: u32,
    },
}

impl<E> DispatchError<E> {
    /// Number of operation invocations made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchError::NoBackendAvailable => 0,
            DispatchError::AllBackendsExhausted { attempts, .. } => *attempts,
        }
    }
}
