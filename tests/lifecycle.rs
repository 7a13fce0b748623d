//! End-to-end startup and shutdown behaviour on real sockets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::Notify;

use app_frame::http::{HttpMethod, HttpResponse};
use app_frame::lifecycle::{HookError, ProcessKind, ProcessState, StartError};
use app_frame::gateway::GatewayMux;
use app_frame::http::RouteError;
use app_frame::rpc::{RegistrarError, RpcRegistrar, RpcServer};
use app_frame::App;

mod common;

struct SlowRegistrar {
    started: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

impl RpcRegistrar for SlowRegistrar {
    fn name(&self) -> &str {
        "slow"
    }

    fn register_service(&self, server: &mut RpcServer) -> Result<(), RegistrarError> {
        let started = self.started.clone();
        let finished = self.finished.clone();
        server.add_method("slow", move |_| {
            let started = started.clone();
            let finished = finished.clone();
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(500)).await;
                finished.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            }
        });
        Ok(())
    }
}

/// Maps a gateway route over the readiness probe.
struct ShadowingRegistrar;

impl RpcRegistrar for ShadowingRegistrar {
    fn name(&self) -> &str {
        "status"
    }

    fn register_service(&self, server: &mut RpcServer) -> Result<(), RegistrarError> {
        server.add_method("status", |_| async { Ok(json!("ok")) });
        Ok(())
    }

    fn register_gateway(&self, gateway: &mut GatewayMux) -> Result<(), RegistrarError> {
        gateway.map(HttpMethod::Get, "/ready", "status")?;
        Ok(())
    }
}

#[tokio::test]
async fn test_graceful_shutdown_of_all_servers() {
    let mut app = App::new(common::local_config(1_000));
    app.register_http_handler(HttpMethod::Get, "/ping", |_| async { Ok(HttpResponse::new("pong")) })
        .unwrap();
    app.register_rpc_handlers(&[&common::EchoRegistrar]).unwrap();
    let coordinator = app.coordinator();
    let token = app.shutdown_token();

    let running = app.start().await.unwrap();
    assert_eq!(coordinator.len(), 4);

    let http = running.process(ProcessKind::Http).unwrap().clone();
    let body = common::client()
        .get(format!("http://{}/ping", http.local_addr()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "pong");

    let handles = running.processes().to_vec();
    running.trigger();
    let report = running.run().await.unwrap();

    assert!(report.is_clean());
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["app-context", "http", "rpc", "gateway"]);
    assert!(token.is_cancelled());
    for handle in handles {
        assert_eq!(handle.state(), ProcessState::Stopped);
        assert!(tokio::net::TcpStream::connect(handle.local_addr()).await.is_err());
    }

    let late = coordinator.add_fn("late", || async { Ok(()) });
    assert!(late.is_err());
}

#[tokio::test]
async fn test_in_flight_rpc_is_force_stopped_at_deadline() {
    let started = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));
    let slow = SlowRegistrar {
        started: started.clone(),
        finished: finished.clone(),
    };

    let mut app = App::new(common::local_config(200));
    app.register_rpc_handlers(&[&slow]).unwrap();
    let running = app.start().await.unwrap();
    let rpc = running.process(ProcessKind::Rpc).unwrap().clone();

    let url = format!("http://{}/rpc", rpc.local_addr());
    let call = tokio::spawn(async move {
        common::client()
            .post(url)
            .json(&json!({"jsonrpc": "2.0", "method": "slow", "id": 1}))
            .send()
            .await
    });
    started.notified().await;

    let begun = Instant::now();
    let report = running.run_until(async {}).await.unwrap();
    let elapsed = begun.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "stopped too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(450), "waited for the request: {elapsed:?}");

    let rpc_outcome = report.outcomes.iter().find(|o| o.name == "rpc").unwrap();
    assert!(matches!(rpc_outcome.result, Err(HookError::Timeout { .. })));
    assert_eq!(rpc.state(), ProcessState::ForceStopped);

    let gateway_outcome = report.outcomes.iter().find(|o| o.name == "gateway").unwrap();
    assert!(gateway_outcome.result.is_ok());

    assert!(call.await.unwrap().is_err());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_http_not_started_without_handlers() {
    let mut app = App::new(common::local_config(500));
    app.register_rpc_handlers(&[&common::EchoRegistrar]).unwrap();
    let coordinator = app.coordinator();

    let running = app.start().await.unwrap();
    assert!(running.process(ProcessKind::Http).is_none());
    assert_eq!(coordinator.len(), 3);

    let report = running.run_until(async {}).await.unwrap();
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["app-context", "rpc", "gateway"]);
}

#[tokio::test]
async fn test_bind_failure_tears_down_started_servers() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_addr = common::free_addr().await;

    let mut config = common::local_config(500);
    config.rpc.bind_address = rpc_addr.to_string();
    config.gateway.bind_address = occupied.local_addr().unwrap().to_string();

    let mut app = App::new(config);
    app.register_rpc_handlers(&[&common::EchoRegistrar]).unwrap();
    let coordinator = app.coordinator();
    let token = app.shutdown_token();

    let err = match app.start().await {
        Ok(_) => panic!("gateway bind should fail"),
        Err(e) => e,
    };
    assert!(matches!(err, StartError::Bind { ref process, .. } if process == "gateway"));

    assert!(coordinator.is_closed());
    assert!(token.is_cancelled());
    assert!(tokio::net::TcpStream::connect(rpc_addr).await.is_err());
}

#[tokio::test]
async fn test_gateway_route_over_readiness_is_start_error() {
    let rpc_addr = common::free_addr().await;
    let mut config = common::local_config(500);
    config.rpc.bind_address = rpc_addr.to_string();

    let mut app = App::new(config);
    app.register_rpc_handlers(&[&ShadowingRegistrar]).unwrap();
    let coordinator = app.coordinator();

    let err = match app.start().await {
        Ok(_) => panic!("route over /ready should fail startup"),
        Err(e) => e,
    };
    assert!(matches!(
        err,
        StartError::Route { ref process, source: RouteError::Reserved { ref reserved, .. } }
            if process == "gateway" && reserved == "/ready"
    ));

    assert!(coordinator.is_closed());
    assert!(tokio::net::TcpStream::connect(rpc_addr).await.is_err());
}
