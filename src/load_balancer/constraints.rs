//! Selection constraints.
//!
//! All fields are optional and AND-combined; an unset field filters nothing.
//! The per-backend concurrency cap is applied implicitly by the balancer on
//! top of whatever is set here.

/// Caller-supplied constraints on backend selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionConstraints {
    /// Exclude backends whose estimated cost per request exceeds this.
    pub max_cost_cents: Option<f64>,

    /// Exclude backends whose smoothed response time exceeds this.
    pub max_latency_ms: Option<f64>,

    /// Exclude backends whose recent success rate is below this.
    pub min_success_rate: Option<f64>,

    /// Restrict selection to local backends (privacy-sensitive work).
    pub require_local: bool,
}

impl SelectionConstraints {
    pub fn max_cost_cents(mut self, cents: f64) -> Self {
        self.max_cost_cents = Some(cents);
        self
    }

    pub fn max_latency_ms(mut self, ms: f64) -> Self {
        self.max_latency_ms = Some(ms);
        self
    }

    pub fn min_success_rate(mut self, rate: f64) -> Self {
        self.min_success_rate = Some(rate);
        self
    }

    pub fn require_local(mut self) -> Self {
        self.require_local = true;
        self
    }
}
