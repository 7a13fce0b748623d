//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FrameConfig (validated, immutable)
//!     → handed to App at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - One graceful shutdown deadline applies to every server

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::FrameConfig;
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RpcConfig;
pub use schema::TimeoutConfig;
