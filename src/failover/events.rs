//! Failover event log.
//!
//! Immutable records of every failover hop, kept in a bounded ring for
//! observability. Snapshot methods copy data out under the lock; no live
//! references escape.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Serialize;

use crate::registry::BackendId;

/// Events kept before the oldest is dropped.
const EVENT_CAPACITY: usize = 1000;

/// Events included in a stats snapshot.
const RECENT_EVENTS: usize = 10;

/// One failover hop, never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct FailoverEvent {
    pub timestamp_unix_ms: u64,
    pub original_backend: BackendId,
    pub failover_backend: BackendId,
    pub reason: String,
    pub success: bool,
}

impl FailoverEvent {
    pub fn new(
        original_backend: BackendId,
        failover_backend: BackendId,
        reason: impl Into<String>,
        success: bool,
    ) -> Self {
        let timestamp_unix_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp_unix_ms,
            original_backend,
            failover_backend,
            reason: reason.into(),
            success,
        }
    }
}

/// Bounded ring of failover events.
#[derive(Debug, Default)]
pub struct FailoverLog {
    events: Mutex<VecDeque<FailoverEvent>>,
}

impl FailoverLog {
    pub fn record(&self, event: FailoverEvent) {
        tracing::info!(
            from = %event.original_backend,
            to = %event.failover_backend,
            reason = %event.reason,
            success = event.success,
            "failover"
        );

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() == EVENT_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Copy-out statistics, combined with the currently open breakers the
    /// manager passes in.
    pub fn stats(&self, open_circuit_breakers: Vec<BackendId>) -> FailoverStats {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let total_failovers = events.len();
        let successful_failovers = events.iter().filter(|e| e.success).count();
        let recent: Vec<FailoverEvent> = events
            .iter()
            .rev()
            .take(RECENT_EVENTS)
            .rev()
            .cloned()
            .collect();

        FailoverStats {
            total_failovers,
            successful_failovers,
            failover_success_rate: if total_failovers > 0 {
                successful_failovers as f64 / total_failovers as f64
            } else {
                0.0
            },
            open_circuit_breakers,
            recent,
        }
    }
}

/// Copy-out summary of failover activity.
#[derive(Debug, Clone, Serialize)]
pub struct FailoverStats {
    pub total_failovers: usize,
    pub successful_failovers: usize,
    pub failover_success_rate: f64,
    pub open_circuit_breakers: Vec<BackendId>,
    pub recent: Vec<FailoverEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_bounded() {
        let log = FailoverLog::default();
        for i in 0..(EVENT_CAPACITY + 5) {
            log.record(FailoverEvent::new(
                BackendId::from("a"),
                BackendId::from("b"),
                format!("hop {i}"),
                true,
            ));
        }
        let stats = log.stats(Vec::new());
        assert_eq!(stats.total_failovers, EVENT_CAPACITY);
        // the oldest events fell off
        assert_eq!(stats.recent.last().unwrap().reason, "hop 1004");
    }

    #[test]
    fn test_stats_success_rate() {
        let log = FailoverLog::default();
        log.record(FailoverEvent::new(
            BackendId::from("a"),
            BackendId::from("b"),
            "hop",
            true,
        ));
        log.record(FailoverEvent::new(
            BackendId::from("a"),
            BackendId::from("c"),
            "exhausted",
            false,
        ));
        let stats = log.stats(vec![BackendId::from("a")]);
        assert_eq!(stats.total_failovers, 2);
        assert_eq!(stats.successful_failovers, 1);
        assert!((stats.failover_success_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.open_circuit_breakers.len(), 1);
        assert_eq!(stats.recent.len(), 2);
    }
}
