//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject values that could not be sent as HTTP headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    if config.proxy.timeout_ms == 0 {
        errors.push(ValidationError::new("proxy.timeout_ms", "must be > 0"));
    }
    if config.proxy.user_agent.trim().is_empty() {
        errors.push(ValidationError::new("proxy.user_agent", "must not be empty"));
    } else if HeaderValue::from_str(&config.proxy.user_agent).is_err() {
        errors.push(ValidationError::new(
            "proxy.user_agent",
            "contains characters not allowed in a header value",
        ));
    }
    if config.proxy.partition.is_empty() {
        errors.push(ValidationError::new("proxy.partition", "must not be empty"));
    }

    if config.store.dir_name.is_empty() {
        errors.push(ValidationError::new("store.dir_name", "must not be empty"));
    }
    if config.store.file_name.is_empty() {
        errors.push(ValidationError::new("store.file_name", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
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
