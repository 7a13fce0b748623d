//! Remote-procedure subsystem.
//!
//! # Data Flow
//! ```text
//! RpcRegistrar::register_service → RpcServer (method registry)
//! RpcRegistrar::register_gateway → GatewayMux (REST → method mapping)
//!
//! POST /rpc (JSON-RPC 2.0)
//!     → server.rs (decode, dispatch)
//!     → method handler
//!     → JSON-RPC response, or 204 for notifications
//! ```

pub mod registrar;
pub mod server;
pub mod types;

pub use registrar::{RegistrarError, RpcRegistrar};
pub use server::RpcServer;
pub use types::{Request, RequestId, Response, RpcError};
