//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid, weights >= 1)
//! - Detect duplicate backend identifiers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - An unknown algorithm name is not an error; selection falls back to round-robin

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend #{index} has an empty id")]
    EmptyBackendId { index: usize },

    #[error("duplicate backend id '{0}'")]
    DuplicateBackendId(String),

    #[error("backend '{0}' has an empty host")]
    EmptyHost(String),

    #[error("backend '{0}' has port 0")]
    InvalidPort(String),

    #[error("backend '{0}' has weight 0 (must be >= 1)")]
    ZeroWeight(String),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("control server url '{0}' must start with http:// or https://")]
    InvalidServerUrl(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (index, backend) in config.backends.iter().enumerate() {
        if backend.id.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendId { index });
            continue;
        }
        if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackendId(backend.id.clone()));
        }
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(backend.id.clone()));
        }
        if backend.port == 0 {
            errors.push(ValidationError::InvalidPort(backend.id.clone()));
        }
        if backend.weight == 0 {
            errors.push(ValidationError::ZeroWeight(backend.id.clone()));
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "health_check.interval_secs" });
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue { field: "health_check.timeout_ms" });
    }
    if config.dispatch.max_connections_per_backend == 0 {
        errors.push(ValidationError::ZeroValue { field: "dispatch.max_connections_per_backend" });
    }
    if config.dispatch.proxy_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "dispatch.proxy_timeout_secs" });
    }
    if config.dispatch.packet_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "dispatch.packet_timeout_secs" });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.request_timeout_secs" });
    }
    if config.control.max_connections == 0 {
        errors.push(ValidationError::ZeroValue { field: "control.max_connections" });
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.control.enabled {
        check_address(&mut errors, "control.bind_address", &config.control.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    for url in &config.control.server_urls {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::InvalidServerUrl(url.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn backend(id: &str, port: u16, weight: u32) -> BackendConfig {
        BackendConfig {
            id: id.into(),
            host: "localhost".into(),
            port,
            weight,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BalancerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = BalancerConfig::default();
        config.backends = vec![
            backend("a", 8081, 1),
            backend("a", 0, 0),
            backend("", 8083, 1),
        ];
        config.health_check.interval_secs = 0;
        config.control.server_urls = vec!["localhost:8081".into()];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateBackendId("a".into())));
        assert!(errors.contains(&ValidationError::InvalidPort("a".into())));
        assert!(errors.contains(&ValidationError::ZeroWeight("a".into())));
        assert!(errors.contains(&ValidationError::EmptyBackendId { index: 2 }));
        assert!(errors.contains(&ValidationError::ZeroValue { field: "health_check.interval_secs" }));
        assert!(errors.contains(&ValidationError::InvalidServerUrl("localhost:8081".into())));
    }

    #[test]
    fn unknown_algorithm_is_accepted() {
        let mut config = BalancerConfig::default();
        config.algorithm = "FASTEST".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let mut config = BalancerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
