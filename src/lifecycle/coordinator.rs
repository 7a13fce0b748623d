//! Shutdown hook registry and the single shutdown pass.
//!
//! Subsystems register named teardown hooks at any point during startup.
//! `close_all` snapshots the registry under its guard, closes it to further
//! registration, runs every hook on its own task and waits for all of them.
//! Failures are logged and collected, never propagated.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::lifecycle::error::{HookError, RegisterError};
use crate::observability::metrics;

type HookFn = dyn Fn() -> BoxFuture<'static, Result<(), HookError>> + Send + Sync;

/// A named teardown action.
///
/// Cloning shares the underlying action: registering two clones of the same
/// hook runs it twice.
#[derive(Clone)]
pub struct ShutdownHook {
    name: Arc<str>,
    run: Arc<HookFn>,
}

impl ShutdownHook {
    /// Create a hook from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            run: Arc::new(move || f().boxed()),
        }
    }

    /// Name used in logs and outcomes.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook").field("name", &self.name).finish()
    }
}

/// Result of one hook invocation.
#[derive(Debug)]
pub struct HookOutcome {
    pub name: String,
    pub result: Result<(), HookError>,
    pub elapsed: Duration,
    index: usize,
}

/// Everything the shutdown pass observed.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Outcomes in registration order.
    pub outcomes: Vec<HookOutcome>,
    /// Wall-clock duration of the whole pass.
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Outcomes that carry an error.
    pub fn failures(&self) -> impl Iterator<Item = &HookOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Number of hooks that returned successfully.
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// True when no hook failed.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

enum Registry {
    Open(Vec<ShutdownHook>),
    Closed,
}

/// Lifecycle coordinator.
///
/// Shared by `Arc` with every component that owns something to tear down.
pub struct Coordinator {
    registry: Mutex<Registry>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::Open(Vec::new())),
        }
    }

    /// Register a hook for the shutdown pass.
    ///
    /// Fails only once the pass has taken its snapshot, so a late hook is
    /// never dropped silently.
    pub fn add(&self, hook: ShutdownHook) -> Result<(), RegisterError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *registry {
            Registry::Open(hooks) => {
                tracing::debug!(hook = %hook.name, "Shutdown hook registered");
                hooks.push(hook);
                Ok(())
            }
            Registry::Closed => Err(RegisterError::Closed(hook.name.to_string())),
        }
    }

    /// Register an async closure as a hook.
    pub fn add_fn<F, Fut>(&self, name: impl Into<String>, f: F) -> Result<(), RegisterError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.add(ShutdownHook::new(name, f))
    }

    /// Number of hooks waiting for the pass.
    pub fn len(&self) -> usize {
        match &*self.registry.lock().unwrap_or_else(PoisonError::into_inner) {
            Registry::Open(hooks) => hooks.len(),
            Registry::Closed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the shutdown pass has started.
    pub fn is_closed(&self) -> bool {
        matches!(
            &*self.registry.lock().unwrap_or_else(PoisonError::into_inner),
            Registry::Closed
        )
    }

    /// Run every registered hook concurrently, exactly once.
    ///
    /// Returns `None` when another caller already started the pass. Otherwise
    /// blocks until every hook has returned.
    pub async fn close_all(&self) -> Option<ShutdownReport> {
        let hooks = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *registry, Registry::Closed) {
                Registry::Open(hooks) => hooks,
                Registry::Closed => {
                    tracing::debug!("Shutdown pass already started");
                    return None;
                }
            }
        };

        let started = Instant::now();
        tracing::info!(hooks = hooks.len(), "Running shutdown hooks");

        let mut tasks = JoinSet::new();
        for (index, hook) in hooks.into_iter().enumerate() {
            tasks.spawn(run_hook(index, hook));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    outcomes.push(outcome);
                }
                Err(e) => tracing::error!(error = %e, "Shutdown hook task failed to join"),
            }
        }
        outcomes.sort_by_key(|o| o.index);

        let report = ShutdownReport {
            outcomes,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            succeeded = report.successes(),
            failed = report.failures().count(),
            elapsed = ?report.elapsed,
            "Shutdown hooks finished"
        );
        Some(report)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("pending", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_hook(index: usize, hook: ShutdownHook) -> HookOutcome {
    let started = Instant::now();
    let result = match AssertUnwindSafe((hook.run)()).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(HookError::Panicked),
    };
    HookOutcome {
        name: hook.name.to_string(),
        result,
        elapsed: started.elapsed(),
        index,
    }
}

fn log_outcome(outcome: &HookOutcome) {
    match &outcome.result {
        Ok(()) => {
            tracing::info!(hook = %outcome.name, elapsed = ?outcome.elapsed, "Shutdown hook completed");
        }
        Err(e) => {
            tracing::error!(
                hook = %outcome.name,
                elapsed = ?outcome.elapsed,
                timeout = e.is_timeout(),
                error = %error_chain(e),
                "Shutdown hook failed"
            );
        }
    }
    metrics::record_hook_outcome(&outcome.name, outcome.result.is_ok());
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
