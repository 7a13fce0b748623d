//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;

use app_frame::gateway::GatewayMux;
use app_frame::http::HttpMethod;
use app_frame::rpc::{RegistrarError, RpcError, RpcRegistrar, RpcServer};
use app_frame::FrameConfig;

/// Config with every server on an ephemeral loopback port.
pub fn local_config(graceful_ms: u64) -> FrameConfig {
    let mut config = FrameConfig::default();
    config.http.bind_address = "127.0.0.1:0".into();
    config.rpc.bind_address = "127.0.0.1:0".into();
    config.gateway.bind_address = "127.0.0.1:0".into();
    config.graceful_shutdown_timeout_ms = Some(graceful_ms);
    config.timeouts.upstream_secs = 5;
    config
}

/// Reserve a free loopback port and release it.
pub async fn free_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .no_proxy()
        .build()
        .unwrap()
}

/// `echo` and `strict` methods, exposed on the gateway.
pub struct EchoRegistrar;

impl RpcRegistrar for EchoRegistrar {
    fn name(&self) -> &str {
        "echo"
    }

    fn register_service(&self, server: &mut RpcServer) -> Result<(), RegistrarError> {
        server.add_method("echo", |params: Value| async move { Ok(params) });
        server.add_method("strict", |params: Value| async move {
            match params.get("name") {
                Some(name) => Ok(serde_json::json!({ "hello": name })),
                None => Err(RpcError::invalid_params("`name` is required")),
            }
        });
        server.add_method("fail", |_| async { Err(RpcError::new(-32000, "backend exploded")) });
        Ok(())
    }

    fn register_gateway(&self, gateway: &mut GatewayMux) -> Result<(), RegistrarError> {
        gateway.map(HttpMethod::Post, "/v1/echo", "echo")?;
        gateway.map(HttpMethod::Get, "/v1/echo", "echo")?;
        gateway.map(HttpMethod::Get, "/v1/users/{id}", "echo")?;
        gateway.map(HttpMethod::Post, "/v1/strict", "strict")?;
        gateway.map(HttpMethod::Post, "/v1/fail", "fail")?;
        gateway.map(HttpMethod::Post, "/v1/missing", "missing")?;
        Ok(())
    }
}
