//! Gateway subsystem: REST front for the remote-procedure server.
//!
//! # Data Flow
//! ```text
//! REST request (GatewayMux route)
//!     → server.rs (params from body, query, path)
//!     → proxy.rs (JSON-RPC POST to the RPC process)
//!     → HTTP status mapped from the reply
//!
//! /live, /ready → health probes
//! {docs_prefix}/* → static documentation
//! ```

pub mod mux;
pub mod proxy;
pub mod server;

pub use mux::GatewayMux;
pub use proxy::{dial_address, ProxyError, RpcProxy};
pub use server::gateway_router;
