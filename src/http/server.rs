//! Plain request server: route table and middleware stack.
//!
//! # Responsibilities
//! - Collect method + pattern + handler registrations
//! - Build the Axum router once, at start
//! - Wire up middleware (panic recovery, request ID, tracing, timeout)
//! - Map handler results to HTTP responses

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::pattern::{validate_pattern, RouteError};
use crate::http::request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::http::response::{error_response, HttpError, HttpResponse};

/// Methods a plain handler can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Put,
    Delete,
    Options,
}

impl HttpMethod {
    pub(crate) fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Head => MethodFilter::HEAD,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Options => MethodFilter::OPTIONS,
        }
    }
}

type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<HttpResponse, HttpError>> + Send + Sync>;

/// Registered plain handlers, keyed by pattern then method.
#[derive(Default, Clone)]
pub struct HttpRoutes {
    routes: BTreeMap<String, BTreeMap<HttpMethod, BoxedHandler>>,
}

impl HttpRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern` (Axum path syntax, e.g. `/users/{id}`).
    ///
    /// A second registration for the same method and pattern replaces the first.
    /// Patterns Axum cannot route are rejected here.
    pub fn add<F, Fut>(&mut self, method: HttpMethod, pattern: impl Into<String>, handler: F) -> Result<(), RouteError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HttpError>> + Send + 'static,
    {
        let pattern = pattern.into();
        validate_pattern(&pattern)?;
        let boxed: BoxedHandler = Arc::new(move |request| handler(request).boxed());
        let previous = self.routes.entry(pattern.clone()).or_default().insert(method, boxed);
        if previous.is_some() {
            tracing::warn!(method = ?method, pattern = %pattern, "Replacing existing handler");
        }
        Ok(())
    }

    /// Number of method + pattern pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Build the router with the full middleware stack.
    #[allow(deprecated)]
    pub fn into_router(self, request_timeout: Duration) -> Router {
        let mut router = Router::new();
        for (pattern, methods) in self.routes {
            let mut method_router = MethodRouter::new();
            for (method, handler) in methods {
                method_router = method_router.on(method.filter(), move |request: Request| dispatch(handler.clone(), request));
            }
            router = router.route(&pattern, method_router);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }
}

async fn dispatch(handler: BoxedHandler, request: Request) -> Response {
    let request_id = request.request_id().map(str::to_owned);
    match handler(request).await {
        Ok(response) => response.into_response(),
        Err(e) => error_response(&e, request_id.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn methods_on_one_pattern_share_a_route() {
        let mut routes = HttpRoutes::new();
        routes.add(HttpMethod::Get, "/items", |_| async { Ok(HttpResponse::new("list")) }).unwrap();
        routes.add(HttpMethod::Post, "/items", |_| async { Ok(HttpResponse::new("created")) }).unwrap();
        assert_eq!(routes.len(), 2);

        let router = routes.into_router(Duration::from_secs(5));
        let listed = router.clone().oneshot(get("/items")).await.unwrap();
        assert_eq!(body_text(listed).await, "list");

        let post = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/items")
            .body(Body::empty())
            .unwrap();
        let created = router.clone().oneshot(post).await.unwrap();
        assert_eq!(body_text(created).await, "created");

        let put = axum::http::Request::builder()
            .method(Method::PUT)
            .uri("/items")
            .body(Body::empty())
            .unwrap();
        assert_eq!(router.oneshot(put).await.unwrap().status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn reregistering_replaces_handler() {
        let mut routes = HttpRoutes::new();
        routes.add(HttpMethod::Get, "/v", |_| async { Ok(HttpResponse::new("old")) }).unwrap();
        routes.add(HttpMethod::Get, "/v", |_| async { Ok(HttpResponse::new("new")) }).unwrap();
        assert_eq!(routes.len(), 1);

        let response = routes.into_router(Duration::from_secs(5)).oneshot(get("/v")).await.unwrap();
        assert_eq!(body_text(response).await, "new");
    }

    #[tokio::test]
    async fn handler_error_uses_its_status_and_echoes_request_id() {
        let mut routes = HttpRoutes::new();
        routes.add(HttpMethod::Get, "/missing", |_| async {
            Err(HttpError::new("no such thing").with_status(StatusCode::NOT_FOUND))
        })
        .unwrap();
        routes.add(HttpMethod::Get, "/broken", |_| async { Err(HttpError::new("oops")) }).unwrap();
        let router = routes.into_router(Duration::from_secs(5));

        let response = router.clone().oneshot(get("/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let response = router.oneshot(get("/broken")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("\"error\":\"oops\""));
    }

    #[test]
    fn unroutable_pattern_is_rejected_at_registration() {
        let mut routes = HttpRoutes::new();
        let err = routes
            .add(HttpMethod::Get, "items", |_| async { Ok(HttpResponse::new("x")) })
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
        assert!(routes.is_empty());
    }

    #[tokio::test]
    async fn panicking_handler_is_recovered() {
        let mut routes = HttpRoutes::new();
        routes.add(HttpMethod::Get, "/panic", explode).unwrap();

        let response = routes.into_router(Duration::from_secs(5)).oneshot(get("/panic")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn explode(_request: Request) -> Result<HttpResponse, HttpError> {
        panic!("handler exploded")
    }
}
