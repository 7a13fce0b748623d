//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborators register checks (checker.rs):
//!     add_liveness_check / add_readiness_check
//!
//! Probe request (probe.rs):
//!     GET /live or GET /ready
//!     → run every check of that kind
//!     → 200 if all pass, 500 otherwise
//! ```
//!
//! # Design Decisions
//! - Every check runs on each probe; one failure does not skip the rest
//! - Check bodies belong to collaborators, the probe only aggregates

pub mod checker;
pub mod probe;

pub use checker::{CheckError, CheckFn, ChecksAdder, Health, ProbeResult};
pub use probe::probe_router;
