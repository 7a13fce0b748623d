//! REST route table for the gateway.

use std::collections::BTreeMap;

use crate::http::{validate_pattern, HttpMethod, RouteError};

/// REST routes mapped onto remote-procedure methods.
///
/// Filled by [`RpcRegistrar::register_gateway`](crate::rpc::RpcRegistrar::register_gateway)
/// and served by the gateway process.
#[derive(Debug, Clone, Default)]
pub struct GatewayMux {
    routes: BTreeMap<String, BTreeMap<HttpMethod, String>>,
}

impl GatewayMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward `method path` to the RPC method `rpc_method`.
    ///
    /// `path` uses Axum syntax; captured segments (`/users/{id}`) are passed
    /// to the method as params.
    pub fn map(
        &mut self,
        method: HttpMethod,
        path: impl Into<String>,
        rpc_method: impl Into<String>,
    ) -> Result<(), RouteError> {
        let path = path.into();
        validate_pattern(&path)?;
        let rpc_method = rpc_method.into();
        if let Some(previous) = self.routes.entry(path.clone()).or_default().insert(method, rpc_method) {
            tracing::warn!(method = ?method, path = %path, previous = %previous, "Replacing gateway route");
        }
        Ok(())
    }

    pub fn rpc_method(&self, method: HttpMethod, path: &str) -> Option<&str> {
        self.routes.get(path)?.get(&method).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn routes(&self) -> impl Iterator<Item = (&str, &BTreeMap<HttpMethod, String>)> {
        self.routes.iter().map(|(path, methods)| (path.as_str(), methods))
    }
}
