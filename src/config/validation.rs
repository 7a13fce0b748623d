//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Addresses parse and non-zero ports do not collide
//! - Value ranges (connection limits, prefixes, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: FrameConfig → Result<(), Vec<ValidationError>>

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::schema::FrameConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FrameConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut ports: HashMap<u16, &str> = HashMap::new();

    let listeners = [
        ("http", &config.http.bind_address, config.http.max_connections),
        ("rpc", &config.rpc.bind_address, config.rpc.max_connections),
        ("gateway", &config.gateway.bind_address, config.gateway.max_connections),
    ];

    for (name, address, max_connections) in listeners {
        match address.parse::<SocketAddr>() {
            Ok(addr) if addr.port() != 0 => {
                if let Some(other) = ports.insert(addr.port(), name) {
                    errors.push(ValidationError::new(
                        format!("{name}.bind_address"),
                        format!("port {} already used by {other}", addr.port()),
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                format!("{name}.bind_address"),
                format!("invalid address `{address}`: {e}"),
            )),
        }

        if max_connections == 0 {
            errors.push(ValidationError::new(
                format!("{name}.max_connections"),
                "must be greater than zero",
            ));
        }
    }

    check_prefix(&mut errors, "rpc.path", &config.rpc.path);
    check_prefix(&mut errors, "gateway.docs_prefix", &config.gateway.docs_prefix);

    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than zero"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid address `{}`", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_prefix(errors: &mut Vec<ValidationError>, field: &str, prefix: &str) {
    if !prefix.starts_with('/') || prefix == "/" {
        errors.push(ValidationError::new(field, format!("`{prefix}` must start with `/` and not be `/`")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&FrameConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = FrameConfig::default();
        config.http.bind_address = "0.0.0.0:9000".into();
        config.rpc.bind_address = "0.0.0.0:9000".into();
        config.gateway.bind_address = "nope".into();
        config.gateway.max_connections = 0;
        config.gateway.docs_prefix = "/".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            [
                "rpc.bind_address",
                "gateway.bind_address",
                "gateway.max_connections",
                "gateway.docs_prefix",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        let mut config = FrameConfig::default();
        config.http.bind_address = "127.0.0.1:0".into();
        config.rpc.bind_address = "127.0.0.1:0".into();
        config.gateway.bind_address = "127.0.0.1:0".into();
        assert!(validate_config(&config).is_ok());
    }
}
