//! Gateway router: REST forwarding, static documentation and health probes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, RawPathParams},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::mux::GatewayMux;
use crate::gateway::proxy::{ProxyError, RpcProxy};
use crate::health::{probe_router, Health};
use crate::http::pattern::is_under;
use crate::http::{MakeRequestUuid, RouteError, X_REQUEST_ID};
use crate::observability::metrics;

/// Paths the gateway serves itself.
pub const HEALTH_PATHS: [&str; 2] = ["/live", "/ready"];

/// Build the gateway router.
///
/// Fails when a mapped route shadows a health path or the docs prefix.
pub fn gateway_router(
    mux: &GatewayMux,
    proxy: RpcProxy,
    health: Health,
    config: &GatewayConfig,
) -> Result<Router, RouteError> {
    check_reserved(mux, &config.docs_prefix)?;

    let proxy = Arc::new(proxy);
    let mut router = Router::new();

    for (path, methods) in mux.routes() {
        let mut method_router = MethodRouter::new();
        for (method, rpc_method) in methods {
            let target = Arc::new(Target {
                route: path.to_string(),
                rpc_method: rpc_method.clone(),
                proxy: proxy.clone(),
            });
            method_router = method_router.on(
                method.filter(),
                move |path_params: RawPathParams, Query(query): Query<HashMap<String, String>>, body: Bytes| {
                    forward(target.clone(), path_params, query, body)
                },
            );
        }
        router = router.route(path, method_router);
    }

    tracing::info!(
        routes = mux.len(),
        upstream = %proxy.endpoint(),
        static_dir = %config.static_dir,
        docs_prefix = %config.docs_prefix,
        "Gateway configured"
    );

    Ok(router
        .merge(probe_router(health))
        .nest_service(&config.docs_prefix, ServeDir::new(&config.static_dir))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)))
}

fn check_reserved(mux: &GatewayMux, docs_prefix: &str) -> Result<(), RouteError> {
    for (path, _) in mux.routes() {
        let reserved = if HEALTH_PATHS.contains(&path) {
            Some(path)
        } else if is_under(path, docs_prefix) {
            Some(docs_prefix)
        } else {
            None
        };
        if let Some(reserved) = reserved {
            return Err(RouteError::Reserved {
                pattern: path.to_string(),
                reserved: reserved.to_string(),
            });
        }
    }
    Ok(())
}

struct Target {
    route: String,
    rpc_method: String,
    proxy: Arc<RpcProxy>,
}

async fn forward(
    target: Arc<Target>,
    path_params: RawPathParams,
    query: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let response = match build_params(&path_params, query, &body) {
        Ok(params) => match target.proxy.call(&target.rpc_method, params).await {
            Ok(result) => (StatusCode::OK, Json(result)).into_response(),
            Err(e) => proxy_error(&target, e),
        },
        Err(message) => error_body(StatusCode::BAD_REQUEST, &message, None, None),
    };

    metrics::record_gateway_request(&target.route, response.status().as_u16());
    response
}

/// Params come from the JSON body, or from the query string when the body is
/// empty. Path captures are added to object params without overwriting.
fn build_params(path_params: &RawPathParams, query: HashMap<String, String>, body: &[u8]) -> Result<Value, String> {
    let mut params = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(query.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<_, _>>())
    } else {
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON body: {e}"))?
    };

    if let Value::Object(object) = &mut params {
        for (key, value) in path_params {
            object
                .entry(key.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
        }
    }
    Ok(params)
}

fn proxy_error(target: &Target, error: ProxyError) -> Response {
    let status = error.status_code();
    match &error {
        ProxyError::Rpc(e) => {
            tracing::debug!(route = %target.route, method = %target.rpc_method, code = e.code, "RPC returned error");
            error_body(status, &e.message, Some(e.code), e.data.as_ref())
        }
        other => {
            tracing::warn!(route = %target.route, method = %target.rpc_method, error = %other, "Gateway forward failed");
            error_body(status, &other.to_string(), None, None)
        }
    }
}

fn error_body(status: StatusCode, message: &str, code: Option<i32>, data: Option<&Value>) -> Response {
    let mut body = json!({ "error": message });
    if let Some(code) = code {
        body["code"] = json!(code);
    }
    if let Some(data) = data {
        body["data"] = data.clone();
    }
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use std::time::Duration;

    fn build(mux: &GatewayMux) -> Result<Router, RouteError> {
        let proxy = RpcProxy::new("127.0.0.1:1".parse().unwrap(), "/rpc", Duration::from_secs(1));
        gateway_router(mux, proxy, Health::new(), &GatewayConfig::default())
    }

    #[tokio::test]
    async fn health_and_docs_paths_are_reserved() {
        for path in ["/live", "/ready", "/swagger", "/swagger/{*rest}"] {
            let mut mux = GatewayMux::new();
            mux.map(HttpMethod::Get, path, "status").unwrap();
            assert!(matches!(build(&mux), Err(RouteError::Reserved { .. })), "{path}");
        }
    }

    #[tokio::test]
    async fn rpc_error_data_reaches_the_client() {
        let response = error_body(
            StatusCode::BAD_REQUEST,
            "bad field",
            Some(-32602),
            Some(&json!({"field": "name"})),
        );
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "bad field", "code": -32602, "data": {"field": "name"}}));
    }

    #[tokio::test]
    async fn ordinary_routes_build() {
        let mut mux = GatewayMux::new();
        mux.map(HttpMethod::Get, "/readiness", "status").unwrap();
        mux.map(HttpMethod::Post, "/v1/echo", "echo").unwrap();
        assert!(build(&mux).is_ok());
    }
}
