//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate throughout; subsystems emit structured events
//! - RUST_LOG wins over the configured level when set
//! - Init is idempotent-unsafe by design: call it once, from the binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `default_level` is used when RUST_LOG is unset, e.g. "info" or
/// "backend_dispatch=debug".
pub fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
