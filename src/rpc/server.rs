//! Remote-procedure method registry and its HTTP endpoint.
//!
//! # Responsibilities
//! - Hold the methods attached by registrars
//! - Decode a JSON-RPC request, dispatch it, encode the reply
//! - Answer notifications with 204 and no body

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::post,
    Json, Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::observability::metrics;
use crate::rpc::types::{Request, Response, RpcError, JSONRPC_VERSION};

const UNKNOWN_METHOD_LABEL: &str = "unknown";

type BoxedMethod = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// Shared remote-procedure server instance.
#[derive(Clone, Default)]
pub struct RpcServer {
    methods: HashMap<String, BoxedMethod>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a method. Re-adding a name replaces the earlier handler.
    pub fn add_method<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        let name = name.into();
        let boxed: BoxedMethod = Arc::new(move |params| handler(params).boxed());
        if self.methods.insert(name.clone(), boxed).is_some() {
            tracing::warn!(method = %name, "Replacing existing RPC method");
        }
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Metric label for a called method. Unregistered names share one label
    /// so callers cannot mint new series.
    fn metric_label<'a>(&self, method: &'a str) -> &'a str {
        if self.has_method(method) {
            method
        } else {
            UNKNOWN_METHOD_LABEL
        }
    }

    /// Dispatch a decoded request. Notifications produce no response.
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(Response::error(
                request.id,
                RpcError::invalid_request(format!("unsupported jsonrpc version `{}`", request.jsonrpc)),
            ));
        }

        let result = match self.methods.get(&request.method) {
            Some(method) => method(request.params.unwrap_or(Value::Null)).await,
            None => Err(RpcError::method_not_found(&request.method)),
        };

        metrics::record_rpc_call(self.metric_label(&request.method), result.is_ok());
        if let Err(e) = &result {
            tracing::debug!(method = %request.method, code = e.code, error = %e.message, "RPC call failed");
        }

        let id = request.id?;
        Some(match result {
            Ok(value) => Response::success(Some(id), value),
            Err(error) => Response::error(Some(id), error),
        })
    }

    /// Decode raw bytes and dispatch.
    pub async fn process_message(&self, body: &[u8]) -> Option<Response> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => return Some(Response::error(None, RpcError::parse_error(e.to_string()))),
        };

        let id = value.get("id").cloned().and_then(|id| serde_json::from_value(id).ok());
        match serde_json::from_value::<Request>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Some(Response::error(id, RpcError::invalid_request(e.to_string()))),
        }
    }

    /// Router accepting JSON-RPC POSTs on `path`.
    pub fn into_router(self, path: &str) -> Router {
        tracing::info!(methods = self.len(), path = %path, "RPC endpoint configured");
        Router::new()
            .route(path, post(handle_rpc))
            .with_state(Arc::new(self))
            .layer(TraceLayer::new_for_http())
    }
}

async fn handle_rpc(State(server): State<Arc<RpcServer>>, body: Bytes) -> HttpResponse {
    match server.process_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::{RequestId, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
    use serde_json::json;

    fn server() -> RpcServer {
        let mut server = RpcServer::new();
        server.add_method("echo", |params| async move { Ok(params) });
        server.add_method("strict", |params: Value| async move {
            params
                .get("name")
                .cloned()
                .ok_or_else(|| RpcError::invalid_params("`name` is required"))
        });
        server
    }

    #[tokio::test]
    async fn dispatches_to_method() {
        let response = server()
            .dispatch(Request::new(RequestId::Number(1), "echo", Some(json!({"a": 1}))))
            .await
            .unwrap();
        assert_eq!(response.id, Some(RequestId::Number(1)));
        assert_eq!(response.into_result().unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_method_and_handler_errors() {
        let server = server();
        let missing = server
            .dispatch(Request::new(RequestId::Number(2), "nope", None))
            .await
            .unwrap();
        assert_eq!(missing.into_result().unwrap_err().code, METHOD_NOT_FOUND);

        let invalid = server
            .dispatch(Request::new(RequestId::Number(3), "strict", Some(json!({}))))
            .await
            .unwrap();
        assert_eq!(invalid.into_result().unwrap_err().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_methods_share_one_metric_label() {
        let server = server();
        assert!(server.has_method("echo"));
        assert_eq!(server.metric_label("echo"), "echo");

        for name in ["bogus-1", "bogus-2"] {
            assert!(!server.has_method(name));
            assert_eq!(server.metric_label(name), UNKNOWN_METHOD_LABEL);
            let response = server
                .dispatch(Request::new(RequestId::Number(9), name, None))
                .await
                .unwrap();
            assert_eq!(response.into_result().unwrap_err().code, METHOD_NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn malformed_messages() {
        let server = server();
        let parse = server.process_message(b"{not json").await.unwrap();
        assert_eq!(parse.into_result().unwrap_err().code, PARSE_ERROR);

        let invalid = server.process_message(br#"{"id": 4, "params": []}"#).await.unwrap();
        assert_eq!(invalid.id, Some(RequestId::Number(4)));
        assert_eq!(invalid.into_result().unwrap_err().code, INVALID_REQUEST);

        let version = server
            .process_message(br#"{"jsonrpc": "1.0", "method": "echo", "id": 5}"#)
            .await
            .unwrap();
        assert_eq!(version.into_result().unwrap_err().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let response = server()
            .process_message(br#"{"jsonrpc": "2.0", "method": "echo", "params": [1]}"#)
            .await;
        assert!(response.is_none());
    }
}
