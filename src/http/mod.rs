//! Plain request handling subsystem.
//!
//! # Data Flow
//! ```text
//! App::register_http_handler(method, pattern, handler)
//!     → pattern.rs (syntax check, errors instead of router panics)
//!     → server.rs (HttpRoutes, grouped by pattern)
//!
//! At start:
//!     HttpRoutes → Axum Router + middleware
//!     → lifecycle::process (http ServerProcess)
//!
//! Per request:
//!     request.rs (request id) → handler → response.rs (status/body mapping)
//! ```

pub mod pattern;
pub mod request;
pub mod response;
pub mod server;

pub use pattern::{validate_pattern, RouteError};
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use response::{HttpError, HttpResponse};
pub use server::{HttpMethod, HttpRoutes};
