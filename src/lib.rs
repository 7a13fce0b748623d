//! Application frame hosting a plain request server, a remote-procedure
//! server and a REST gateway under one coordinated shutdown.

// Assembly
pub mod app;

// Servers
pub mod gateway;
pub mod http;
pub mod rpc;

// Core subsystems
pub mod config;
pub mod net;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use app::{App, Running};
pub use config::FrameConfig;
pub use lifecycle::{Coordinator, HookError, ShutdownReport, StartError};
