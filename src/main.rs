//! Application frame binary.
//!
//! Starts the configured servers with a demo `GET /ping` handler and an
//! `echo` RPC service (also reachable as `POST /v1/echo` on the gateway),
//! then blocks until SIGINT/SIGTERM and runs the coordinated shutdown.
//!
//! ```text
//!   :8080  http     plain handlers
//!   :8082  rpc      JSON-RPC 2.0 on POST /rpc
//!   :8081  gateway  REST → rpc, /live, /ready, /swagger
//! ```

use std::path::PathBuf;

use axum::http::HeaderValue;
use clap::Parser;
use serde_json::Value;

use app_frame::config::loader::load_config;
use app_frame::gateway::GatewayMux;
use app_frame::health::{CheckError, ChecksAdder};
use app_frame::http::{HttpMethod, HttpResponse};
use app_frame::observability::{logging, metrics};
use app_frame::rpc::{RegistrarError, RpcError, RpcRegistrar, RpcServer};
use app_frame::{App, FrameConfig};

#[derive(Parser)]
#[command(name = "app-frame")]
#[command(about = "HTTP, RPC and gateway servers with coordinated shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration
    #[arg(short, long)]
    log_level: Option<String>,
}

struct EchoService;

impl RpcRegistrar for EchoService {
    fn name(&self) -> &str {
        "echo"
    }

    fn register_service(&self, server: &mut RpcServer) -> Result<(), RegistrarError> {
        server.add_method("echo", |params: Value| async move {
            if params.is_null() {
                return Err(RpcError::invalid_params("echo needs params"));
            }
            Ok(params)
        });
        Ok(())
    }

    fn register_gateway(&self, gateway: &mut GatewayMux) -> Result<(), RegistrarError> {
        gateway.map(HttpMethod::Post, "/v1/echo", "echo")?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FrameConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_tracing(&config.observability.log_level)?;
    tracing::info!("app-frame v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    tracing::info!(
        http = %config.http.bind_address,
        rpc = %config.rpc.bind_address,
        gateway = %config.gateway.bind_address,
        graceful_timeout = ?config.graceful_shutdown_timeout(),
        "Configuration loaded"
    );

    let mut app = App::new(config);

    let token = app.shutdown_token();
    app.health().add_readiness_check(std::sync::Arc::new(move || {
        if token.is_cancelled() {
            Err(CheckError::new("shutting down"))
        } else {
            Ok(())
        }
    }));

    app.register_http_handler(HttpMethod::Get, "/ping", |_| async {
        Ok(HttpResponse::new("pong").with_content_type(HeaderValue::from_static("text/plain; charset=utf-8")))
    })?;
    app.register_rpc_handlers(&[&EchoService])?;

    let report = app.run().await?;
    if let Some(report) = report {
        if !report.is_clean() {
            tracing::warn!(failed = report.failures().count(), "Some servers were force stopped");
        }
    }

    Ok(())
}
