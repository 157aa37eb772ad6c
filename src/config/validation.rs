//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TransportConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::TransportConfig;
use crate::net::socket::MAX_BACKLOG;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &TransportConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let backlog = config.listener.backlog;
    if !(0..=MAX_BACKLOG).contains(&backlog) {
        errors.push(ValidationError::new(
            "listener.backlog",
            format!("{} is outside 0..={}", backlog, MAX_BACKLOG),
        ));
    }

    if config.keepalive.enabled {
        if config.keepalive.probe_interval_ms == 0 {
            errors.push(ValidationError::new("keepalive.probe_interval_ms", "must be > 0"));
        }
        if config.keepalive.retry_interval_ms == 0 {
            errors.push(ValidationError::new("keepalive.retry_interval_ms", "must be > 0"));
        }
    }

    if let Some(tls) = &config.tls {
        if tls.protocols.is_empty() {
            errors.push(ValidationError::new(
                "tls.protocols",
                "at least one protocol version is required",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
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
