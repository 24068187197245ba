//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend name uniqueness and kind/credential consistency
//! - Validate value ranges (intervals > 0, rates in [0, 1], costs >= 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::DispatchConfig;

/// A single semantic violation found in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. "health.check_interval_secs").
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{i}]");
        if backend.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "backend name must not be empty"));
        }
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate backend name '{}'", backend.name),
            ));
        }
        if backend.estimated_cost_cents < 0.0 {
            errors.push(ValidationError::new(
                &field,
                "estimated_cost_cents must be >= 0",
            ));
        }
        if backend.kind == crate::registry::BackendKind::Local && backend.api_key_env.is_some() {
            errors.push(ValidationError::new(
                &field,
                "api_key_env only applies to hosted backends",
            ));
        }
    }

    if config.health.check_interval_secs == 0 {
        errors.push(ValidationError::new(
            "health.check_interval_secs",
            "must be > 0",
        ));
    }
    if config.health.timeout_secs == 0 {
        errors.push(ValidationError::new("health.timeout_secs", "must be > 0"));
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "health.failure_threshold",
            "must be > 0",
        ));
    }
    if !(0.0..=1.0).contains(&config.health.degraded_success_rate) {
        errors.push(ValidationError::new(
            "health.degraded_success_rate",
            "must be within [0, 1]",
        ));
    }

    if config.load_balancer.max_concurrent_per_backend == 0 {
        errors.push(ValidationError::new(
            "load_balancer.max_concurrent_per_backend",
            "must be > 0",
        ));
    }

    if config.failover.retry_delay_secs < 0.0 || !config.failover.retry_delay_secs.is_finite() {
        errors.push(ValidationError::new(
            "failover.retry_delay_secs",
            "must be a finite value >= 0",
        ));
    }
    if config.failover.circuit_breaker_threshold == 0 {
        errors.push(ValidationError::new(
            "failover.circuit_breaker_threshold",
            "must be > 0",
        ));
    }
    if config.failover.circuit_breaker_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "failover.circuit_breaker_timeout_secs",
            "must be > 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;
    use crate::registry::BackendKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&DispatchConfig::default()).is_ok());
    }

    #[test]
    fn test_all_violations_reported() {
        let mut config = DispatchConfig::default();
        config.backends.push(BackendConfig {
            name: "".into(),
            kind: BackendKind::Local,
            estimated_cost_cents: -1.0,
            api_key_env: Some("KEY".into()),
        });
        config.health.check_interval_secs = 0;
        config.failover.circuit_breaker_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        // empty name + negative cost + local credential + interval + threshold
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_duplicate_backend_names_rejected() {
        let mut config = DispatchConfig::default();
        for _ in 0..2 {
            config.backends.push(BackendConfig {
                name: "ollama:llama3".into(),
                kind: BackendKind::Local,
                estimated_cost_cents: 0.0,
                api_key_env: None,
            });
        }
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("duplicate"));
    }
}
