//! Configuration validation.
//!
//! Serde handles syntax; this pass checks value ranges and cross-field
//! constraints. Every problem is reported, not just the first.

use std::net::SocketAddr;

use crate::app::AppRef;
use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
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

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    } else if config.listener.host.contains(char::is_whitespace) {
        errors.push(ValidationError::new(
            "listener.host",
            format!("'{}' contains whitespace", config.listener.host),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be at least 1",
        ));
    }

    if let Err(e) = config.app.target.parse::<AppRef>() {
        errors.push(ValidationError::new("app.target", e.to_string()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.timeouts.header_read_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.header_read_secs",
            "must be greater than 0",
        ));
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than 0"));
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) if addr.port() == config.listener.port && config.listener.port != 0 => {
                errors.push(ValidationError::new(
                    "observability.metrics_address",
                    format!("port {} collides with the listener port", addr.port()),
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}' is not a socket address: {e}", config.observability.metrics_address),
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
