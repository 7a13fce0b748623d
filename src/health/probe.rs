//! HTTP probe handlers for `/live` and `/ready`.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::health::checker::{Health, ProbeResult};

/// Router exposing `GET /live` and `GET /ready`.
pub fn probe_router(health: Health) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(health)
}

async fn liveness(State(health): State<Health>) -> Response {
    probe_response(health.run_liveness())
}

async fn readiness(State(health): State<Health>) -> Response {
    probe_response(health.run_readiness())
}

fn probe_response(result: ProbeResult) -> Response {
    let status = if result.healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let mut response = (status, Json(result)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}
