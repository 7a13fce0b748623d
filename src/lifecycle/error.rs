//! Lifecycle error taxonomy.
//!
//! # Classes
//! - `StartError`: fatal, propagated to process exit
//! - `HookError`: teardown failure, logged and absorbed by the coordinator
//! - `HookError::Timeout`: teardown failure raised when a graceful stop misses its deadline
//! - `RegisterError`: registration attempted after the shutdown pass began

use std::time::Duration;

use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::http::RouteError;
use crate::net::listener::ListenerError;

/// Failure reported by a shutdown hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// Graceful stop did not finish before the deadline; remaining work was aborted.
    #[error("{process}: force stopped after {deadline:?}")]
    Timeout {
        process: String,
        deadline: Duration,
        #[source]
        source: Elapsed,
    },

    /// Hook reported a failure with a plain message.
    #[error("{0}")]
    Failed(String),

    /// Hook returned an arbitrary error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Hook panicked while running.
    #[error("shutdown hook panicked")]
    Panicked,
}

impl HookError {
    /// Create a failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns true for the timeout class (forced stop).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Registration was rejected.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("cannot register shutdown hook `{0}`: shutdown pass already started")]
    Closed(String),
}

/// Fatal startup error.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("{process}: failed to bind {address}")]
    Bind {
        process: String,
        address: String,
        #[source]
        source: ListenerError,
    },

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error("rpc registrar `{name}` failed: {reason}")]
    Registrar { name: String, reason: String },

    #[error("{process}: route setup failed")]
    Route {
        process: String,
        #[source]
        source: RouteError,
    },
}
