//! Application assembly: registration, startup and the shutdown flow.
//!
//! # Data Flow
//! ```text
//! App::new(config)
//!     → register_http_handler / register_rpc_handlers / health()
//!     → start()
//!         http    (only with routes)
//!         rpc     (only with methods)
//!         gateway (only when rpc started, dials rpc's bound address)
//!     → Running::run()
//!         signal or trigger → Coordinator::close_all() → ShutdownReport
//! ```
//!
//! # Design Decisions
//! - A failed start tears down whatever already started before returning
//! - Every server shares one graceful deadline from config

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, Router};

use crate::config::FrameConfig;
use crate::gateway::{gateway_router, GatewayMux, RpcProxy};
use crate::health::Health;
use crate::http::{HttpError, HttpMethod, HttpResponse, HttpRoutes, RouteError};
use crate::lifecycle::coordinator::{Coordinator, ShutdownReport};
use crate::lifecycle::error::StartError;
use crate::lifecycle::process::{ProcessHandle, ProcessKind, ServerProcess};
use crate::lifecycle::signals::{self, ShutdownToken};
use crate::rpc::{RpcRegistrar, RpcServer};

/// Name of the hook that cancels the application shutdown token.
pub const APP_CONTEXT_HOOK: &str = "app-context";

/// An application that has not started serving yet.
pub struct App {
    config: FrameConfig,
    coordinator: Arc<Coordinator>,
    health: Health,
    token: ShutdownToken,
    http_routes: HttpRoutes,
    rpc_server: RpcServer,
    gateway_mux: GatewayMux,
}

impl App {
    pub fn new(config: FrameConfig) -> Self {
        let coordinator = Arc::new(Coordinator::new());
        let token = ShutdownToken::new();

        let hook_token = token.clone();
        let registered = coordinator.add_fn(APP_CONTEXT_HOOK, move || {
            let token = hook_token.clone();
            async move {
                token.cancel();
                Ok(())
            }
        });
        if let Err(e) = registered {
            tracing::error!(error = %e, "Failed to register application context hook");
        }

        Self {
            config,
            coordinator,
            health: Health::new(),
            token,
            http_routes: HttpRoutes::new(),
            rpc_server: RpcServer::new(),
            gateway_mux: GatewayMux::new(),
        }
    }

    /// Token cancelled when the shutdown pass begins.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.token.clone()
    }

    /// Shared coordinator; other components may register their own hooks.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Health registry served by the gateway's `/live` and `/ready`.
    pub fn health(&self) -> Health {
        self.health.clone()
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Register a plain request handler. See [`HttpRoutes::add`].
    pub fn register_http_handler<F, Fut>(
        &mut self,
        method: HttpMethod,
        pattern: impl Into<String>,
        handler: F,
    ) -> Result<(), StartError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HttpError>> + Send + 'static,
    {
        self.http_routes
            .add(method, pattern, handler)
            .map_err(|source| route_error(ProcessKind::Http, source))
    }

    /// Let each registrar attach RPC methods and gateway routes.
    ///
    /// Calls accumulate; the first failing registrar aborts with
    /// [`StartError::Registrar`].
    pub fn register_rpc_handlers(&mut self, registrars: &[&dyn RpcRegistrar]) -> Result<(), StartError> {
        for registrar in registrars {
            let failed = |e: crate::rpc::RegistrarError| StartError::Registrar {
                name: registrar.name().to_string(),
                reason: e.to_string(),
            };
            registrar.register_service(&mut self.rpc_server).map_err(failed)?;
            registrar.register_gateway(&mut self.gateway_mux).map_err(failed)?;
            tracing::debug!(registrar = registrar.name(), "RPC registrar attached");
        }
        Ok(())
    }

    /// Start the configured servers.
    ///
    /// On failure every server that already started is stopped through the
    /// shutdown pass before the error is returned.
    pub async fn start(self) -> Result<Running, StartError> {
        let coordinator = Arc::clone(&self.coordinator);
        let token = self.token.clone();

        match self.launch().await {
            Ok(processes) => Ok(Running {
                coordinator,
                processes,
                token,
                run_token: ShutdownToken::new(),
            }),
            Err(e) => {
                tracing::error!(error = %e, "Startup failed, stopping started servers");
                coordinator.close_all().await;
                Err(e)
            }
        }
    }

    /// Start, then serve until SIGINT/SIGTERM and run the shutdown pass.
    pub async fn run(self) -> Result<Option<ShutdownReport>, StartError> {
        Ok(self.start().await?.run().await)
    }

    async fn launch(self) -> Result<Vec<ProcessHandle>, StartError> {
        let deadline = self.config.graceful_shutdown_timeout();
        let mut processes = Vec::new();

        if self.http_routes.is_empty() {
            tracing::info!("No HTTP handlers registered, plain request server not started");
        } else {
            let request_timeout = Duration::from_secs(self.config.timeouts.request_secs);
            let routes = self.http_routes;
            let router = build_router(ProcessKind::Http, || Ok(routes.into_router(request_timeout)))?;
            let process = ServerProcess::new(ProcessKind::Http, self.config.http.clone(), router, deadline);
            processes.push(process.start(&self.coordinator).await?);
        }

        if self.rpc_server.is_empty() {
            tracing::info!("No RPC methods registered, RPC and gateway servers not started");
            return Ok(processes);
        }

        for (path, methods) in self.gateway_mux.routes() {
            for rpc_method in methods.values().filter(|m| !self.rpc_server.has_method(m)) {
                tracing::warn!(path = %path, method = %rpc_method, "Gateway route targets an unregistered RPC method");
            }
        }

        let rpc_server = self.rpc_server;
        let rpc_path = self.config.rpc.path.clone();
        let router = build_router(ProcessKind::Rpc, || Ok(rpc_server.into_router(&rpc_path)))?;
        let process = ServerProcess::new(ProcessKind::Rpc, self.config.rpc.listener(), router, deadline);
        let rpc = process.start(&self.coordinator).await?;
        let rpc_addr = rpc.local_addr();
        processes.push(rpc);

        let proxy = RpcProxy::new(
            rpc_addr,
            &self.config.rpc.path,
            Duration::from_secs(self.config.timeouts.upstream_secs),
        );
        let (mux, health, gateway) = (&self.gateway_mux, self.health, &self.config.gateway);
        let router = build_router(ProcessKind::Gateway, || gateway_router(mux, proxy, health, gateway))?;
        let process = ServerProcess::new(ProcessKind::Gateway, self.config.gateway.listener(), router, deadline);
        processes.push(process.start(&self.coordinator).await?);

        Ok(processes)
    }
}

fn route_error(kind: ProcessKind, source: RouteError) -> StartError {
    StartError::Route {
        process: kind.to_string(),
        source,
    }
}

/// Assemble a router, turning an Axum builder panic into a start error so the
/// teardown in [`App::start`] still runs.
fn build_router<F>(kind: ProcessKind, build: F) -> Result<Router, StartError>
where
    F: FnOnce() -> Result<Router, RouteError>,
{
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(built) => built.map_err(|source| route_error(kind, source)),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "router construction panicked".to_string());
            Err(route_error(kind, RouteError::Rejected(reason)))
        }
    }
}

/// A started application.
pub struct Running {
    coordinator: Arc<Coordinator>,
    processes: Vec<ProcessHandle>,
    token: ShutdownToken,
    run_token: ShutdownToken,
}

impl Running {
    /// Started processes, in start order.
    pub fn processes(&self) -> &[ProcessHandle] {
        &self.processes
    }

    pub fn process(&self, kind: ProcessKind) -> Option<&ProcessHandle> {
        self.processes.iter().find(|p| p.kind() == kind)
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Token cancelled when the shutdown pass begins.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.token.clone()
    }

    /// Request shutdown without an OS signal.
    pub fn trigger(&self) {
        self.run_token.cancel();
    }

    /// Serve until SIGINT/SIGTERM (or [`trigger`](Self::trigger)), then run
    /// the shutdown pass.
    ///
    /// Returns `None` if another caller already ran the pass.
    pub async fn run(self) -> Option<ShutdownReport> {
        let listener = signals::listen(self.run_token.clone());
        self.run_token.cancelled().await;
        listener.abort();
        self.shutdown().await
    }

    /// Like [`run`](Self::run), with `signal` in place of OS signals.
    pub async fn run_until<F>(self, signal: F) -> Option<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = signal => {}
            _ = self.run_token.cancelled() => {}
        }
        self.shutdown().await
    }

    async fn shutdown(self) -> Option<ShutdownReport> {
        tracing::info!(processes = self.processes.len(), "Shutdown requested");
        let report = self.coordinator.close_all().await?;
        for failure in report.failures() {
            if let Err(e) = &failure.result {
                tracing::warn!(hook = %failure.name, error = %e, "Shutdown hook did not finish cleanly");
            }
        }
        tracing::info!(elapsed = ?report.elapsed, clean = report.is_clean(), "Shutdown complete");
        Some(report)
    }
}
