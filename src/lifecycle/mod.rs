//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (process.rs):
//!     bind → spawn accept loop → Running → register stop hook
//!
//! Shutdown (coordinator.rs):
//!     close_all → snapshot hooks → run all concurrently → ShutdownReport
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel ShutdownToken → main flow calls close_all
//! ```
//!
//! # Design Decisions
//! - Hooks run concurrently; one slow or failing hook never delays another
//! - Each server bounds its own stop with the graceful deadline
//! - Registration after the pass started is rejected, not dropped

pub mod coordinator;
pub mod error;
pub mod process;
pub mod signals;

pub use coordinator::{Coordinator, HookOutcome, ShutdownHook, ShutdownReport};
pub use error::{HookError, RegisterError, StartError};
pub use process::{ProcessHandle, ProcessKind, ProcessState, ServerProcess};
pub use signals::ShutdownToken;
