//! Liveness and readiness check registry.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

/// Failure reported by a health check.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CheckError(pub String);

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type CheckFn = Arc<dyn Fn() -> Result<(), CheckError> + Send + Sync>;

/// Registration side of the health registry, handed to collaborators.
pub trait ChecksAdder {
    fn add_liveness_check(&self, check: CheckFn);
    fn add_readiness_check(&self, check: CheckFn);
}

/// Aggregated outcome of one probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub healthy: bool,
    pub checks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

#[derive(Default)]
struct Checks {
    liveness: Vec<CheckFn>,
    readiness: Vec<CheckFn>,
}

/// Shared health registry. Clones observe the same checks.
#[derive(Clone, Default)]
pub struct Health {
    checks: Arc<RwLock<Checks>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_liveness(&self) -> ProbeResult {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        run_checks("liveness", &checks.liveness)
    }

    pub fn run_readiness(&self) -> ProbeResult {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        run_checks("readiness", &checks.readiness)
    }
}

impl ChecksAdder for Health {
    fn add_liveness_check(&self, check: CheckFn) {
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .liveness
            .push(check);
    }

    fn add_readiness_check(&self, check: CheckFn) {
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .readiness
            .push(check);
    }
}

impl std::fmt::Debug for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Health")
            .field("liveness", &checks.liveness.len())
            .field("readiness", &checks.readiness.len())
            .finish()
    }
}

fn run_checks(kind: &str, checks: &[CheckFn]) -> ProbeResult {
    let failures: Vec<String> = checks
        .iter()
        .filter_map(|check| check().err())
        .map(|e| e.to_string())
        .collect();

    for failure in &failures {
        tracing::warn!(probe = kind, error = %failure, "Health check failed");
    }

    ProbeResult {
        healthy: failures.is_empty(),
        checks: checks.len(),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn no_checks_is_healthy() {
        let health = Health::new();
        assert!(health.run_liveness().healthy);
        assert!(health.run_readiness().healthy);
    }

    #[test]
    fn runs_every_check_after_a_failure() {
        let health = Health::new();
        let calls = Arc::new(AtomicUsize::new(0));

        health.add_readiness_check(Arc::new(|| Err(CheckError::new("db down"))));
        let counted = calls.clone();
        health.add_readiness_check(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let result = health.run_readiness();
        assert!(!result.healthy);
        assert_eq!(result.checks, 2);
        assert_eq!(result.failures, ["db down"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(health.run_liveness().healthy);
    }
}
