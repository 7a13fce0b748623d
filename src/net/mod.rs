//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (tracking, HTTP/1 + HTTP/2 serving)
//!     → Hand off to the process router
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection watches its server's drain signal
//! - Dropping a connection task aborts its in-flight requests

pub mod connection;
pub mod listener;
