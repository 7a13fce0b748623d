//! Gateway to RPC forwarding.
//!
//! # Responsibilities
//! - Wrap REST params into a JSON-RPC call with a fresh UUID id
//! - POST it to the RPC process over a pooled hyper-util client
//! - Map the reply (or the transport failure) to an HTTP status

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;

use crate::rpc::types::{
    self, RequestId, Response as RpcResponse, RpcError, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

/// Largest RPC reply the gateway will buffer.
const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Rpc(RpcError),

    #[error("RPC server unreachable: {0}")]
    Unreachable(String),

    #[error("RPC call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid RPC reply: {0}")]
    InvalidReply(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Rpc(e) => rpc_status(e.code),
            ProxyError::Unreachable(_) | ProxyError::InvalidReply(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// HTTP status for a JSON-RPC error code.
pub fn rpc_status(code: i32) -> StatusCode {
    match code {
        INVALID_PARAMS | INVALID_REQUEST | PARSE_ERROR => StatusCode::BAD_REQUEST,
        METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Address to dial for a bound listener; wildcard binds are reached on loopback.
pub fn dial_address(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port()),
        _ => bound,
    }
}

/// Client side of the gateway's connection to the RPC process.
#[derive(Clone)]
pub struct RpcProxy {
    client: Client<HttpConnector, Body>,
    endpoint: String,
    timeout: Duration,
}

impl RpcProxy {
    pub fn new(rpc_addr: SocketAddr, rpc_path: &str, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            endpoint: format!("http://{}{}", dial_address(rpc_addr), rpc_path),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `method` and return its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ProxyError> {
        let id = RequestId::String(uuid::Uuid::new_v4().to_string());
        let call = types::Request::new(id.clone(), method, Some(params));
        let payload = serde_json::to_vec(&call).map_err(|e| ProxyError::InvalidReply(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .map_err(|e| ProxyError::Unreachable(e.to_string()))?;

        let response: hyper::Response<hyper::body::Incoming> = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))?
            .map_err(|e| ProxyError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProxyError::InvalidReply(format!("status {}", response.status())));
        }

        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| ProxyError::InvalidReply(e.to_string()))?;
        let reply: RpcResponse =
            serde_json::from_slice(&body).map_err(|e| ProxyError::InvalidReply(e.to_string()))?;

        if reply.id.as_ref() != Some(&id) && reply.error.is_none() {
            return Err(ProxyError::InvalidReply(format!("reply id does not match {id}")));
        }

        reply.into_result().map_err(ProxyError::Rpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_status() {
        assert_eq!(rpc_status(INVALID_PARAMS), StatusCode::BAD_REQUEST);
        assert_eq!(rpc_status(PARSE_ERROR), StatusCode::BAD_REQUEST);
        assert_eq!(rpc_status(METHOD_NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(rpc_status(-32000), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ProxyError::Unreachable("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn wildcard_bind_is_dialled_on_loopback() {
        let v4: SocketAddr = "0.0.0.0:8082".parse().unwrap();
        assert_eq!(dial_address(v4), "127.0.0.1:8082".parse::<SocketAddr>().unwrap());

        let v6: SocketAddr = "[::]:8082".parse().unwrap();
        assert_eq!(dial_address(v6), "[::1]:8082".parse::<SocketAddr>().unwrap());

        let fixed: SocketAddr = "10.0.0.5:8082".parse().unwrap();
        assert_eq!(dial_address(fixed), fixed);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = RpcProxy::new(addr, "/rpc", Duration::from_secs(2));
        let err = proxy.call("echo", Value::Null).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
