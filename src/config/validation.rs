//! Configuration validation.
//!
//! Serde handles syntax; this pass handles semantics (value ranges, relations
//! between fields). All violations are collected and returned together, not
//! just the first one.

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic violation in a loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a configuration, returning every violation found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(err(
            "listener.bind_address",
            format!("not a valid socket address: {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(err("listener.request_timeout_secs", "must be greater than zero"));
    }

    if config.rate_limit.enabled {
        if !(config.rate_limit.rps > 0.0) {
            errors.push(err("rate_limit.rps", "must be greater than zero"));
        }
        if config.rate_limit.burst == 0 {
            errors.push(err("rate_limit.burst", "must be at least 1"));
        }
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(err("rate_limit.sweep_interval_secs", "must be greater than zero"));
        }
        // An idle threshold at or below the sweep period evicts active but
        // bursty clients, resetting their buckets to full burst.
        if config.rate_limit.idle_threshold_secs <= config.rate_limit.sweep_interval_secs {
            errors.push(err(
                "rate_limit.idle_threshold_secs",
                "must exceed rate_limit.sweep_interval_secs",
            ));
        }
    }

    if config.shutdown.grace_period_secs == 0 {
        errors.push(err("shutdown.grace_period_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(err(
            "observability.metrics_address",
            format!(
                "not a valid socket address: {:?}",
                config.observability.metrics_address
            ),
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

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_violations() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.rps = 0.0;
        config.rate_limit.burst = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "rate_limit.burst"));
    }

    #[test]
    fn idle_threshold_must_exceed_sweep_interval() {
        let mut config = ServerConfig::default();
        config.rate_limit.idle_threshold_secs = 30;
        config.rate_limit.sweep_interval_secs = 60;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "rate_limit.idle_threshold_secs");
    }

    #[test]
    fn disabled_rate_limit_skips_limit_checks() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.rps = 0.0;
        config.rate_limit.burst = 0;

        assert!(validate_config(&config).is_ok());
    }
}
