//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every field has a default, so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Graceful stop deadline used when none (or zero) is configured.
pub const GRACEFUL_SHUTDOWN_TIMEOUT_SECS_DEFAULT: u64 = 10;

/// Root configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Plain request server.
    pub http: ListenerConfig,

    /// Remote-procedure server.
    pub rpc: RpcConfig,

    /// Gateway, static docs and health probes.
    pub gateway: GatewayConfig,

    /// Graceful stop deadline per server, in seconds. Zero means default.
    pub graceful_shutdown_timeout_secs: u64,

    /// Millisecond override for the graceful stop deadline.
    pub graceful_shutdown_timeout_ms: Option<u64>,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            http: ListenerConfig::with_address("0.0.0.0:8080"),
            rpc: RpcConfig::default(),
            gateway: GatewayConfig::default(),
            graceful_shutdown_timeout_secs: GRACEFUL_SHUTDOWN_TIMEOUT_SECS_DEFAULT,
            graceful_shutdown_timeout_ms: None,
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl FrameConfig {
    /// Deadline applied to every server's stop hook.
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        if let Some(ms) = self.graceful_shutdown_timeout_ms.filter(|ms| *ms > 0) {
            return Duration::from_millis(ms);
        }
        let secs = match self.graceful_shutdown_timeout_secs {
            0 => GRACEFUL_SHUTDOWN_TIMEOUT_SECS_DEFAULT,
            secs => secs,
        };
        Duration::from_secs(secs)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn with_address(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            ..Self::default()
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Remote-procedure server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub bind_address: String,
    pub max_connections: usize,

    /// Path accepting JSON-RPC POSTs.
    pub path: String,
}

impl RpcConfig {
    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            bind_address: self.bind_address.clone(),
            max_connections: self.max_connections,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8082".to_string(),
            max_connections: 10_000,
            path: "/rpc".to_string(),
        }
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub max_connections: usize,

    /// Directory holding static documentation assets.
    pub static_dir: String,

    /// URL prefix the documentation is served under.
    pub docs_prefix: String,
}

impl GatewayConfig {
    pub fn listener(&self) -> ListenerConfig {
        ListenerConfig {
            bind_address: self.bind_address.clone(),
            max_connections: self.max_connections,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            max_connections: 10_000,
            static_dir: "./doc/swagger".to_string(),
            docs_prefix: "/swagger".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout on the plain request server, in seconds.
    pub request_secs: u64,

    /// Gateway to RPC call timeout, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ports() {
        let config = FrameConfig::default();
        assert_eq!(config.http.bind_address, "0.0.0.0:8080");
        assert_eq!(config.gateway.bind_address, "0.0.0.0:8081");
        assert_eq!(config.rpc.bind_address, "0.0.0.0:8082");
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let config = FrameConfig {
            graceful_shutdown_timeout_secs: 0,
            ..FrameConfig::default()
        };
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn millisecond_override_wins() {
        let config = FrameConfig {
            graceful_shutdown_timeout_secs: 3,
            graceful_shutdown_timeout_ms: Some(200),
            ..FrameConfig::default()
        };
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: FrameConfig = toml::from_str(
            r#"
            graceful_shutdown_timeout_secs = 5

            [rpc]
            bind_address = "127.0.0.1:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.bind_address, "127.0.0.1:9000");
        assert_eq!(config.rpc.path, "/rpc");
        assert_eq!(config.http.bind_address, "0.0.0.0:8080");
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_secs(5));
    }
}
