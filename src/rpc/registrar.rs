//! Registration contract for remote-procedure services.

use crate::gateway::mux::GatewayMux;
use crate::http::RouteError;
use crate::rpc::server::RpcServer;

/// Failure while attaching a service.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RegistrarError(pub String);

impl RegistrarError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<RouteError> for RegistrarError {
    fn from(e: RouteError) -> Self {
        Self(e.to_string())
    }
}

/// Attaches a service to the shared RPC server and, optionally, REST routes
/// to the shared gateway.
pub trait RpcRegistrar: Send + Sync {
    /// Name used in startup errors and logs.
    fn name(&self) -> &str;

    fn register_service(&self, server: &mut RpcServer) -> Result<(), RegistrarError>;

    fn register_gateway(&self, _gateway: &mut GatewayMux) -> Result<(), RegistrarError> {
        Ok(())
    }
}
